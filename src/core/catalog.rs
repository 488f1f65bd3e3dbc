//! Register catalog
//!
//! Static mapping from a point name to its channel, device address,
//! register address and data type. Loaded once before polling starts;
//! the only thing that changes afterwards is each point's last value.

use crate::core::protocol::{DataType, Value};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Two points share a name
    #[error("Duplicate point name: {0}")]
    DuplicateName(String),

    /// A point table row could not be parsed
    #[error("Invalid point table row {row}: {message}")]
    InvalidRow {
        /// Line in the CSV file, header is line 1
        row: usize,
        /// Parser message
        message: String,
    },

    /// Point table could not be opened
    #[error("Point table error: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the point table.
///
/// Column names follow the English headers; the headers of the legacy
/// Chinese-language point tables are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointDefinition {
    /// Unique point name
    #[serde(alias = "变量名")]
    pub name: String,
    /// Owning channel id
    #[serde(alias = "串口名", alias = "channel_id")]
    pub channel: String,
    /// Register data type
    #[serde(alias = "数据类型", deserialize_with = "deserialize_data_type")]
    pub data_type: DataType,
    /// Slave address on the shared line
    #[serde(alias = "从机地址")]
    pub device_address: u8,
    /// First register (or coil) address
    #[serde(alias = "寄存器起始地址")]
    pub register_address: u16,
    /// Writes are rejected before any I/O
    #[serde(alias = "是否只读", default, deserialize_with = "deserialize_flag")]
    pub read_only: bool,
}

fn deserialize_data_type<'de, D>(deserializer: D) -> Result<DataType, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Text(s) => matches!(s.trim(), "Y" | "y" | "true" | "TRUE" | "True" | "1"),
    })
}

/// A catalog point: immutable identity plus the last decoded value
#[derive(Debug)]
pub struct RegisterPoint {
    definition: PointDefinition,
    last_value: RwLock<Option<Value>>,
}

impl RegisterPoint {
    /// Create a point that has never been read
    pub fn new(definition: PointDefinition) -> Self {
        Self {
            definition,
            last_value: RwLock::new(None),
        }
    }

    /// Unique point name
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Channel the point is polled on
    pub fn channel(&self) -> &str {
        &self.definition.channel
    }

    /// Decoded type; also selects function code and register count
    pub fn data_type(&self) -> DataType {
        self.definition.data_type
    }

    /// Slave address on the bus
    pub fn device_address(&self) -> u8 {
        self.definition.device_address
    }

    /// First coil or holding register
    pub fn register_address(&self) -> u16 {
        self.definition.register_address
    }

    /// Writes are rejected before encoding
    pub fn read_only(&self) -> bool {
        self.definition.read_only
    }

    /// Definition the point was built from
    pub fn definition(&self) -> &PointDefinition {
        &self.definition
    }

    /// Last successfully decoded value, if the point was ever read
    pub fn last_value(&self) -> Option<Value> {
        *self.last_value.read()
    }

    /// Only the channel scheduler writes this
    pub(crate) fn set_last_value(&self, value: Value) {
        *self.last_value.write() = Some(value);
    }
}

/// Ordered collection of register points
#[derive(Debug, Default)]
pub struct RegisterCatalog {
    points: Vec<Arc<RegisterPoint>>,
    by_name: HashMap<String, usize>,
}

impl RegisterCatalog {
    /// Build a catalog, keeping definition order
    pub fn from_definitions<I>(definitions: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = PointDefinition>,
    {
        let mut catalog = Self::default();
        for definition in definitions {
            if catalog.by_name.contains_key(&definition.name) {
                return Err(CatalogError::DuplicateName(definition.name));
            }
            catalog
                .by_name
                .insert(definition.name.clone(), catalog.points.len());
            catalog.points.push(Arc::new(RegisterPoint::new(definition)));
        }
        Ok(catalog)
    }

    /// Load a point table from a CSV file
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;
        Self::from_definitions(read_rows(reader)?)
    }

    /// Parse a point table from any CSV source
    pub fn from_csv_reader<R: Read>(source: R) -> Result<Self, CatalogError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self::from_definitions(read_rows(reader)?)
    }

    /// Look a point up by name
    pub fn get(&self, name: &str) -> Option<&Arc<RegisterPoint>> {
        self.by_name.get(name).map(|&i| &self.points[i])
    }

    /// All points in catalog order
    pub fn points(&self) -> &[Arc<RegisterPoint>] {
        &self.points
    }

    /// Points owned by `channel`, in catalog order
    pub fn channel_points(&self, channel: &str) -> Vec<Arc<RegisterPoint>> {
        self.points
            .iter()
            .filter(|p| p.channel() == channel)
            .cloned()
            .collect()
    }

    /// Distinct channel ids in order of first appearance
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = Vec::new();
        for point in &self.points {
            if !channels.iter().any(|c| c == point.channel()) {
                channels.push(point.channel().to_string());
            }
        }
        channels
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the catalog has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn read_rows<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<PointDefinition>, CatalogError> {
    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<PointDefinition>().enumerate() {
        // Line 1 is the header
        let row = record.map_err(|e| CatalogError::InvalidRow {
            row: index + 2,
            message: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn definition(name: &str, channel: &str) -> PointDefinition {
        PointDefinition {
            name: name.to_string(),
            channel: channel.to_string(),
            data_type: DataType::Int16,
            device_address: 1,
            register_address: 0,
            read_only: false,
        }
    }

    #[test]
    fn test_catalog_order_and_channels() {
        let catalog = RegisterCatalog::from_definitions(vec![
            definition("a", "COM1"),
            definition("b", "COM2"),
            definition("c", "COM1"),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.channels(), vec!["COM1".to_string(), "COM2".to_string()]);
        let names: Vec<_> = catalog
            .channel_points("COM1")
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(catalog.get("b").is_some());
        assert!(catalog.get("z").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = RegisterCatalog::from_definitions(vec![definition("a", "COM1"), definition("a", "COM2")])
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn test_last_value() {
        let point = RegisterPoint::new(definition("a", "COM1"));
        assert_eq!(point.last_value(), None);
        point.set_last_value(Value::Int16(7));
        assert_eq!(point.last_value(), Some(Value::Int16(7)));
    }

    #[test]
    fn test_csv_english_headers() {
        let csv = "name,channel,data_type,device_address,register_address,read_only\n\
                   temp,COM3,Float32,1,0,Y\n\
                   run,COM3,bool,1,10,N\n\
                   speed,COM4,int16,2,5,\n";
        let catalog = RegisterCatalog::from_csv_reader(csv.as_bytes()).unwrap();

        let temp = catalog.get("temp").unwrap();
        assert_eq!(temp.data_type(), DataType::Float32);
        assert!(temp.read_only());

        let run = catalog.get("run").unwrap();
        assert_eq!(run.data_type(), DataType::Bool);
        assert_eq!(run.register_address(), 10);
        assert!(!run.read_only());

        let speed = catalog.get("speed").unwrap();
        assert_eq!(speed.device_address(), 2);
        assert!(!speed.read_only());
    }

    #[test]
    fn test_csv_chinese_headers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "变量名,串口名,数据类型,从机地址,寄存器起始地址,是否只读").unwrap();
        writeln!(file, "温度,COM3,float32,1,0,Y").unwrap();
        writeln!(file, "设定值,COM3,int16,1,2,N").unwrap();
        file.flush().unwrap();

        let catalog = RegisterCatalog::load_csv(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("温度").unwrap().read_only());
        assert_eq!(catalog.get("设定值").unwrap().register_address(), 2);
    }

    #[test]
    fn test_csv_bad_data_type() {
        let csv = "name,channel,data_type,device_address,register_address,read_only\n\
                   ok,COM3,int16,1,0,N\n\
                   bad,COM3,int32,1,0,N\n";
        let err = RegisterCatalog::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRow { row: 3, .. }));
    }

    #[test]
    fn test_definition_from_toml() {
        let toml_text = r#"
            name = "flow"
            channel = "COM1"
            data_type = "float32"
            device_address = 4
            register_address = 100
            read_only = true
        "#;
        let def: PointDefinition = toml::from_str(toml_text).unwrap();
        assert_eq!(def.data_type, DataType::Float32);
        assert!(def.read_only);
    }
}
