use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{ShortName, parse_instant};
use crate::error::HarvestError;
use crate::geometry::NormalizedPolygon;
use crate::identity::{ProductId, SCHEMA_VERSION, product_id};

#[derive(Debug, Clone)]
pub struct RawGranuleRecord {
    pub time_start: String,
    pub time_end: String,
    pub polygons: Vec<Vec<String>>,
    fields: Map<String, Value>,
}

impl RawGranuleRecord {
    pub fn from_value(value: Value) -> Result<Self, HarvestError> {
        let Value::Object(fields) = value else {
            return Err(HarvestError::InvalidRecord(
                "granule entry is not a JSON object".to_string(),
            ));
        };
        let time_start = required_str(&fields, "time_start")?;
        let time_end = required_str(&fields, "time_end")?;
        let polygons = match fields.get("polygons") {
            Some(value) => serde_json::from_value::<Vec<Vec<String>>>(value.clone())
                .map_err(|err| HarvestError::GeometryParse(format!("polygons field: {err}")))?,
            None => {
                return Err(HarvestError::GeometryParse(
                    "granule entry has no polygons".to_string(),
                ));
            }
        };
        Ok(Self {
            time_start,
            time_end,
            polygons,
            fields,
        })
    }

    pub fn short_name(&self) -> Option<&str> {
        self.fields.get("short_name").and_then(Value::as_str)
    }
}

fn required_str(fields: &Map<String, Value>, key: &str) -> Result<String, HarvestError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HarvestError::InvalidRecord(format!("missing string field {key}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    #[serde(rename = "label")]
    pub id: ProductId,
    #[serde(rename = "starttime")]
    pub start: String,
    #[serde(rename = "endtime")]
    pub end: String,
    pub location: NormalizedPolygon,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataDescriptor(Map<String, Value>);

impl MetadataDescriptor {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub dataset: DatasetDescriptor,
    pub metadata: MetadataDescriptor,
}

impl Product {
    pub fn from_record(record: RawGranuleRecord, short_name: &ShortName) -> Result<Self, HarvestError> {
        let start = parse_instant(&record.time_start)?;
        let end = parse_instant(&record.time_end)?;
        let location = NormalizedPolygon::from_record_polygons(&record.polygons)?;
        let id = product_id(short_name, &start, &end);

        let dataset = DatasetDescriptor {
            id: id.clone(),
            start: record.time_start,
            end: record.time_end,
            location,
            version: SCHEMA_VERSION.to_string(),
        };
        let mut fields = record.fields;
        fields.insert(
            "shortname".to_string(),
            Value::String(short_name.as_str().to_string()),
        );

        Ok(Self {
            id,
            dataset,
            metadata: MetadataDescriptor(fields),
        })
    }
}
