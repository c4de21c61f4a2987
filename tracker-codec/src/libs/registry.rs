//! Device classes and the payload layouts they use.
//!
//! A registry is built once at startup from a [`RegistryTable`], validated, and then shared
//! read-only. Resolution goes device EUI → class → the schema accepting the payload length.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{
    error::{DecodeError, SchemaError},
    schema::{FieldSpec, FieldValue, FloatSliceSpec, Layout, PayloadSchema, Placeholder, Scale},
    timestamp::TimestampFormat,
};

/// Devices sharing one family of payload layouts.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DeviceClass {
    pub name: String,
    /// Device EUIs in hexadecimal.
    pub devices: Vec<String>,
    pub schemas: Vec<PayloadSchema>,
}

/// Serializable registry content, for example from a JSON5 schema file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RegistryTable {
    pub classes: Vec<DeviceClass>,
}

#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    classes: Vec<DeviceClass>,
    /// Upper-case EUI to index in `classes`.
    devices: HashMap<String, usize>,
}

const DEGREE_COUNT: Scale = Scale::Div(10_000_000.0);
const CENTI: Scale = Scale::Div(100.0);
const ONE: Scale = Scale::Div(1.0);

impl RegistryTable {
    /// The layouts observed in deployment.
    pub fn builtin() -> Self {
        let tuino_v3 = vec![
            FieldSpec::unsigned("frame_header", 0, 8, ONE, ""),
            FieldSpec::unsigned("temperature", 8, 16, CENTI, "°C"),
            FieldSpec::unsigned("humidity", 24, 16, CENTI, "%RH"),
            FieldSpec::unsigned("latitude", 40, 32, DEGREE_COUNT, "deg"),
            FieldSpec::unsigned("longitude", 72, 32, DEGREE_COUNT, "deg"),
            FieldSpec::unsigned("satellites", 104, 8, ONE, ""),
            FieldSpec::unsigned("hdop", 112, 16, ONE, ""),
            FieldSpec::unsigned("speed", 128, 8, Scale::Div(2.0), "km/h"),
            FieldSpec::unsigned("course", 136, 8, Scale::Mul(2.0), "deg"),
            FieldSpec::unsigned("track_id", 144, 8, ONE, ""),
            FieldSpec::unsigned("tx_power", 152, 8, ONE, "dBm"),
        ];
        let tuino_v2 = vec![
            FieldSpec::unsigned("temperature", 8, 16, CENTI, "°C"),
            FieldSpec::unsigned("humidity", 24, 16, CENTI, "%RH"),
            FieldSpec::unsigned("latitude", 40, 32, DEGREE_COUNT, "deg"),
            FieldSpec::unsigned("longitude", 72, 32, DEGREE_COUNT, "deg"),
            FieldSpec::unsigned("satellites", 104, 8, ONE, ""),
            FieldSpec::unsigned("hdop", 112, 16, ONE, ""),
            FieldSpec::unsigned("track_id", 128, 8, ONE, ""),
        ];
        let direxio_floats = vec![
            FloatSliceSpec {
                name: "latitude".to_string(),
                byte_offset: 5,
                unit: "deg".to_string(),
            },
            FloatSliceSpec {
                name: "longitude".to_string(),
                byte_offset: 10,
                unit: "deg".to_string(),
            },
        ];
        // Not transmitted by the device. -99 reads as "not applicable" downstream.
        let direxio_placeholders = [
            ("temperature", -99),
            ("humidity", -99),
            ("satellites", 0),
            ("hdop", 20),
            ("speed", 0),
            ("course", 0),
            ("tx_power", 0),
            ("track_id", 99),
        ]
        .iter()
        .map(|(name, value)| Placeholder {
            name: name.to_string(),
            value: FieldValue::Int(*value),
        })
        .collect();

        RegistryTable {
            classes: vec![
                DeviceClass {
                    name: "tuino".to_string(),
                    devices: vec!["78AF580300000485".to_string(), "78AF580300000506".to_string()],
                    schemas: vec![
                        PayloadSchema {
                            version: "tuino-v3".to_string(),
                            device_class: String::new(),
                            byte_length: 20,
                            timestamp: TimestampFormat::new("+02:00"),
                            layout: Layout::Packed { fields: tuino_v3 },
                        },
                        PayloadSchema {
                            version: "tuino-v2".to_string(),
                            device_class: String::new(),
                            byte_length: 17,
                            timestamp: TimestampFormat::new("+01:00"),
                            layout: Layout::Packed { fields: tuino_v2 },
                        },
                    ],
                },
                DeviceClass {
                    name: "direxio".to_string(),
                    devices: vec!["78AF58060000006D".to_string()],
                    schemas: vec![PayloadSchema {
                        version: "direxio-v1".to_string(),
                        device_class: String::new(),
                        byte_length: 14,
                        timestamp: TimestampFormat::new("+02:00"),
                        layout: Layout::FloatSlice {
                            floats: direxio_floats,
                            placeholders: direxio_placeholders,
                        },
                    }],
                },
            ],
        }
    }
}

impl SchemaRegistry {
    /// Validates the table and builds the lookup index.
    pub fn new(table: RegistryTable) -> Result<Self, SchemaError> {
        const FN_NAME: &'static str = "SchemaRegistry::new";

        let mut classes = table.classes;
        let names: Vec<String> = classes.iter().map(|c| c.name.clone()).collect();
        let mut devices: HashMap<String, usize> = HashMap::new();
        let mut versions: HashSet<String> = HashSet::new();

        for (index, class) in classes.iter_mut().enumerate() {
            for schema in class.schemas.iter_mut() {
                schema.device_class = class.name.clone();
                schema.validate()?;
                if !versions.insert(schema.version.clone()) {
                    return Err(SchemaError::DuplicateVersion(schema.version.clone()));
                }
            }
            check_lengths(class)?;

            for device in class.devices.iter() {
                let key = device.to_uppercase();
                if let Some(other) = devices.insert(key, index) {
                    return Err(SchemaError::DuplicateDevice {
                        device: device.clone(),
                        first: names[other].clone(),
                        second: class.name.clone(),
                    });
                }
            }
        }

        info!(
            "[{}] {} classes, {} devices, {} schemas",
            FN_NAME,
            classes.len(),
            devices.len(),
            versions.len()
        );
        Ok(SchemaRegistry { classes, devices })
    }

    /// The registry of [`RegistryTable::builtin()`].
    pub fn builtin() -> Result<Self, SchemaError> {
        SchemaRegistry::new(RegistryTable::builtin())
    }

    /// Builds a registry from the JSON5 form of a [`RegistryTable`].
    pub fn from_json5(text: &str) -> Result<Self, SchemaError> {
        let table: RegistryTable =
            json5::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;
        SchemaRegistry::new(table)
    }

    /// Class name of a device.
    pub fn device_class(&self, dev_eui: &str) -> Option<&str> {
        self.devices
            .get(&dev_eui.to_uppercase())
            .map(|index| self.classes[*index].name.as_str())
    }

    /// Selects the schema for a device and an observed payload length.
    pub fn resolve(&self, dev_eui: &str, byte_length: usize) -> Result<&PayloadSchema, DecodeError> {
        const FN_NAME: &'static str = "SchemaRegistry::resolve";

        let class = match self.devices.get(&dev_eui.to_uppercase()) {
            None => {
                debug!("[{}] unknown device {}", FN_NAME, dev_eui);
                return Err(DecodeError::UnknownDevice(dev_eui.to_string()));
            }
            Some(index) => &self.classes[*index],
        };
        match class.schemas.iter().find(|s| s.accepts_len(byte_length)) {
            None => {
                debug!(
                    "[{}] no {} schema for {} bytes from {}",
                    FN_NAME, class.name, byte_length, dev_eui
                );
                Err(DecodeError::SchemaMismatch {
                    class: class.name.clone(),
                    len: byte_length,
                })
            }
            Some(schema) => Ok(schema),
        }
    }

    /// Looks up a schema by its version tag.
    pub fn schema(&self, version: &str) -> Option<&PayloadSchema> {
        self.classes
            .iter()
            .flat_map(|c| c.schemas.iter())
            .find(|s| s.version.eq(version))
    }

    /// All known device EUIs in upper case.
    pub fn devices(&self) -> Vec<String> {
        let mut list: Vec<String> = self.devices.keys().cloned().collect();
        list.sort();
        list
    }

    pub fn classes(&self) -> &[DeviceClass] {
        self.classes.as_slice()
    }
}

/// Rejects two schemas of one class that would both accept some payload length.
fn check_lengths(class: &DeviceClass) -> Result<(), SchemaError> {
    for (i, first) in class.schemas.iter().enumerate() {
        for second in class.schemas.iter().skip(i + 1) {
            let probe = first.byte_length.max(second.byte_length);
            if first.accepts_len(probe) && second.accepts_len(probe) {
                return Err(SchemaError::AmbiguousLength {
                    class: class.name.clone(),
                    first: first.version.clone(),
                    second: second.version.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed_schema(version: &str, byte_length: usize) -> PayloadSchema {
        PayloadSchema {
            version: version.to_string(),
            device_class: String::new(),
            byte_length,
            timestamp: TimestampFormat::default(),
            layout: Layout::Packed {
                fields: vec![FieldSpec::unsigned("a", 0, 8, ONE, "")],
            },
        }
    }

    fn class(name: &str, devices: &[&str], schemas: Vec<PayloadSchema>) -> DeviceClass {
        DeviceClass {
            name: name.to_string(),
            devices: devices.iter().map(|d| d.to_string()).collect(),
            schemas,
        }
    }

    #[test]
    fn builtin_is_valid() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(registry.classes().len(), 2);
        assert_eq!(
            registry.devices(),
            vec!["78AF580300000485", "78AF580300000506", "78AF58060000006D"]
        );
        assert_eq!(registry.device_class("78af580300000506"), Some("tuino"));
        assert_eq!(registry.device_class("78AF58060000006D"), Some("direxio"));
        assert_eq!(registry.device_class("0000000000000000"), None);
    }

    #[test]
    fn resolve_by_exact_length() {
        let registry = SchemaRegistry::builtin().unwrap();
        let v3 = registry.resolve("78AF580300000485", 20).unwrap();
        let v2 = registry.resolve("78AF580300000485", 17).unwrap();
        assert_eq!(v3.version, "tuino-v3");
        assert_eq!(v3.device_class, "tuino");
        assert_eq!(v2.version, "tuino-v2");
        assert_eq!(
            registry.resolve("78AF580300000485", 18),
            Err(DecodeError::SchemaMismatch {
                class: "tuino".to_string(),
                len: 18,
            })
        );
        assert_eq!(
            registry.resolve("78AF580300000485", 0).unwrap_err(),
            DecodeError::SchemaMismatch {
                class: "tuino".to_string(),
                len: 0,
            }
        );
    }

    #[test]
    fn resolve_unknown_device() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(
            registry.resolve("78AF5803000004", 20),
            Err(DecodeError::UnknownDevice("78AF5803000004".to_string()))
        );
    }

    #[test]
    fn resolve_float_slice_minimum() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(registry.resolve("78AF58060000006D", 14).is_ok());
        assert!(registry.resolve("78AF58060000006D", 24).is_ok());
        assert!(matches!(
            registry.resolve("78AF58060000006D", 13),
            Err(DecodeError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn reject_duplicate_device() {
        let table = RegistryTable {
            classes: vec![
                class("a", &["0011"], vec![packed_schema("a-v1", 1)]),
                class("b", &["0011"], vec![packed_schema("b-v1", 1)]),
            ],
        };
        assert_eq!(
            SchemaRegistry::new(table).unwrap_err(),
            SchemaError::DuplicateDevice {
                device: "0011".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            }
        );
    }

    #[test]
    fn reject_duplicate_version() {
        let table = RegistryTable {
            classes: vec![
                class("a", &["0011"], vec![packed_schema("v1", 1)]),
                class("b", &["0022"], vec![packed_schema("v1", 2)]),
            ],
        };
        assert_eq!(
            SchemaRegistry::new(table).unwrap_err(),
            SchemaError::DuplicateVersion("v1".to_string())
        );
    }

    #[test]
    fn reject_ambiguous_lengths() {
        let table = RegistryTable {
            classes: vec![class(
                "a",
                &["0011"],
                vec![packed_schema("a-v1", 2), packed_schema("a-v2", 2)],
            )],
        };
        assert!(matches!(
            SchemaRegistry::new(table),
            Err(SchemaError::AmbiguousLength { .. })
        ));
    }

    #[test]
    fn reject_invalid_schema() {
        let mut schema = packed_schema("a-v1", 1);
        schema.layout = Layout::Packed {
            fields: vec![FieldSpec::unsigned("a", 4, 8, ONE, "")],
        };
        let table = RegistryTable {
            classes: vec![class("a", &["0011"], vec![schema])],
        };
        assert!(matches!(
            SchemaRegistry::new(table),
            Err(SchemaError::InvalidField { .. })
        ));

        let text = r#"{
            classes: [{
                name: "probe",
                devices: ["00AA"],
                schemas: [{
                    version: "probe-v1",
                    byteLength: 2,
                    layout: { packed: { fields: [{ name: "a", bitOffset: 4294967290, bitWidth: 16 }] } },
                }],
            }],
        }"#;
        assert!(matches!(
            SchemaRegistry::from_json5(text),
            Err(SchemaError::InvalidField { field, .. }) if field == "a"
        ));

        let text = r#"{
            classes: [{
                name: "probe",
                devices: ["00AA"],
                schemas: [{
                    version: "probe-v1",
                    byteLength: 14,
                    layout: { "float-slice": { floats: [{ name: "x", byteOffset: 18446744073709551615 }] } },
                }],
            }],
        }"#;
        assert!(matches!(
            SchemaRegistry::from_json5(text),
            Err(SchemaError::InvalidField { field, .. }) if field == "x"
        ));
    }

    #[test]
    fn from_json5_table() {
        let text = r#"{
            // one class, one layout
            classes: [{
                name: "probe",
                devices: ["00AA"],
                schemas: [{
                    version: "probe-v1",
                    byteLength: 3,
                    timestamp: { utcOffset: "+01:00" },
                    layout: {
                        packed: {
                            fields: [
                                { name: "level", bitOffset: 0, bitWidth: 12, scale: { div: 10 } },
                                { name: "delta", bitOffset: 12, bitWidth: 12, signed: true, scale: { mul: 2 } },
                            ],
                        },
                    },
                }],
            }],
        }"#;
        let registry = SchemaRegistry::from_json5(text).unwrap();
        let schema = registry.resolve("00aa", 3).unwrap();
        assert_eq!(schema.device_class, "probe");
        assert_eq!(schema.timestamp, TimestampFormat::new("+01:00"));

        assert!(matches!(
            SchemaRegistry::from_json5("{ classes: 1 }"),
            Err(SchemaError::Parse(_))
        ));
    }

    #[test]
    fn builtin_round_trips_through_json5() {
        let text = serde_json::to_string(&RegistryTable::builtin()).unwrap();
        let registry = SchemaRegistry::from_json5(text.as_str()).unwrap();
        let builtin = SchemaRegistry::builtin().unwrap();
        for version in ["tuino-v3", "tuino-v2", "direxio-v1"] {
            assert_eq!(registry.schema(version), builtin.schema(version));
        }
    }
}
