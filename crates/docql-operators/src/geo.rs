//! Geo-spatial operators. Points are `[lat, lng]` pairs or geo point values.

use docql_core::naming::{self, FieldTarget};
use docql_core::value::{GeoPoint, Value};
use serde_json::{json, Map, Value as Json};

use crate::fragment::Fragment;
use crate::registry::OperatorTag;
use crate::traits::{OpError, OperatorStrategy};

fn point(tag: OperatorTag, value: &Value) -> Result<GeoPoint, OpError> {
    let p = GeoPoint::from_value(value).ok_or_else(|| {
        OpError::argument(tag, "expects a geo point or [latitude, longitude]")
    })?;
    if !(-90.0..=90.0).contains(&p.latitude) || !(-180.0..=180.0).contains(&p.longitude) {
        return Err(OpError::argument(
            tag,
            format!("coordinates out of range ({}, {})", p.latitude, p.longitude),
        ));
    }
    Ok(p)
}

/// `{field: {$near: point}}`
pub struct Near;

impl OperatorStrategy for Near {
    fn tag(&self) -> OperatorTag {
        OperatorTag::Near
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        point(self.tag(), value).map(|_| ())
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        let p = point(self.tag(), value)?;
        Ok(Fragment::filter(
            naming::field_for(operand, target),
            json!({ "$near": Value::GeoPoint(p).to_json(target) }),
        ))
    }
}

/// `{field: {$near: point, $maxDistanceIn<Unit>: d}}`.
///
/// Value is `[lat, lng, distance]` or `{point, distance}`.
pub struct WithinDistance {
    tag: OperatorTag,
    key: &'static str,
}

impl WithinDistance {
    pub fn miles() -> Self {
        Self {
            tag: OperatorTag::WithinMiles,
            key: "$maxDistanceInMiles",
        }
    }

    pub fn kilometers() -> Self {
        Self {
            tag: OperatorTag::WithinKilometers,
            key: "$maxDistanceInKilometers",
        }
    }

    fn parts(&self, value: &Value) -> Result<(GeoPoint, f64), OpError> {
        let (p, d) = match value {
            Value::Array(items) if items.len() == 3 => {
                let p = point(self.tag, &Value::Array(items[..2].to_vec()))?;
                (p, items[2].as_f64())
            }
            Value::Object(map) => {
                let p = map
                    .get("point")
                    .ok_or_else(|| OpError::argument(self.tag, "requires a 'point'"))?;
                (point(self.tag, p)?, map.get("distance").and_then(Value::as_f64))
            }
            _ => {
                return Err(OpError::argument(
                    self.tag,
                    "expects [latitude, longitude, distance] or {point, distance}",
                ))
            }
        };
        match d {
            Some(d) if d >= 0.0 => Ok((p, d)),
            _ => Err(OpError::argument(
                self.tag,
                "distance must be a non-negative number",
            )),
        }
    }
}

impl OperatorStrategy for WithinDistance {
    fn tag(&self) -> OperatorTag {
        self.tag
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        self.parts(value).map(|_| ())
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        let (p, d) = self.parts(value)?;
        let mut cond = Map::new();
        cond.insert("$near".into(), Value::GeoPoint(p).to_json(target));
        cond.insert(self.key.into(), json!(d));
        Ok(Fragment::filter(
            naming::field_for(operand, target),
            Json::Object(cond),
        ))
    }
}

/// `{field: {$within: {$box: [southwest, northeast]}}}`
pub struct WithinBox;

impl WithinBox {
    fn corners(value: &Value) -> Result<(GeoPoint, GeoPoint), OpError> {
        match value.as_array() {
            Some([sw, ne]) => Ok((
                point(OperatorTag::WithinBox, sw)?,
                point(OperatorTag::WithinBox, ne)?,
            )),
            _ => Err(OpError::argument(
                OperatorTag::WithinBox,
                "expects [southwest, northeast] corners",
            )),
        }
    }
}

impl OperatorStrategy for WithinBox {
    fn tag(&self) -> OperatorTag {
        OperatorTag::WithinBox
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        Self::corners(value).map(|_| ())
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        let (sw, ne) = Self::corners(value)?;
        Ok(Fragment::filter(
            naming::field_for(operand, target),
            json!({
                "$within": {
                    "$box": [
                        Value::GeoPoint(sw).to_json(target),
                        Value::GeoPoint(ne).to_json(target),
                    ]
                }
            }),
        ))
    }
}
