//! `point()` construction and `distance()`: Euclidean for Cartesian SRIDs,
//! haversine (meters) for geographic SRID 4326.

use crate::model::{PropertyMap, Value};
use crate::{Error, Result};

const WGS84_SRID: i32 = 4326;
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub fn call(name: &str, args: &[Value]) -> Result<Option<Value>> {
    let result = match name {
        "point" => Some(point(args)?),
        "distance" | "point.distance" => Some(distance(args)?),
        "point.withinbbox" => Some(within_bbox(args)?),
        "point.withinpolygon" => Some(within_polygon(args)?),
        _ => None,
    };
    Ok(result)
}

fn point(args: &[Value]) -> Result<Value> {
    let m = match args.first() {
        Some(Value::Map(m)) => m,
        other => {
            return Err(Error::TypeError {
                expected: "Map".into(),
                got: other.map(|v| v.type_name()).unwrap_or("nothing").into(),
            });
        }
    };
    let x = req_float(m, "x")?;
    let y = req_float(m, "y")?;
    let srid = m.get("srid").and_then(Value::as_int).map(|i| i as i32).unwrap_or(WGS84_SRID);
    match m.get("z") {
        Some(z_val) => {
            let z = z_val.as_float().ok_or_else(|| Error::TypeError { expected: "Float".into(), got: z_val.type_name().into() })?;
            Ok(Value::Point3D { srid, x, y, z })
        }
        None => Ok(Value::Point2D { srid, x, y }),
    }
}

fn req_float(m: &PropertyMap, key: &str) -> Result<f64> {
    m.get(key)
        .and_then(Value::as_float)
        .ok_or_else(|| Error::ArgumentError(format!("point() map requires numeric '{key}'")))
}

fn distance(args: &[Value]) -> Result<Value> {
    match (args.first(), args.get(1)) {
        (Some(Value::Point2D { x: x1, y: y1, srid: s1 }), Some(Value::Point2D { x: x2, y: y2, srid: s2 })) => {
            if *s1 == WGS84_SRID && *s2 == WGS84_SRID {
                Ok(Value::Float(haversine(*y1, *x1, *y2, *x2)))
            } else {
                Ok(Value::Float(((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()))
            }
        }
        (
            Some(Value::Point3D { x: x1, y: y1, z: z1, .. }),
            Some(Value::Point3D { x: x2, y: y2, z: z2, .. }),
        ) => Ok(Value::Float(((x2 - x1).powi(2) + (y2 - y1).powi(2) + (z2 - z1).powi(2)).sqrt())),
        (Some(Value::Null), _) | (_, Some(Value::Null)) => Ok(Value::Null),
        (a, b) => Err(Error::TypeError {
            expected: "two Points of matching dimension".into(),
            got: format!(
                "{}, {}",
                a.map(|v| v.type_name()).unwrap_or("nothing"),
                b.map(|v| v.type_name()).unwrap_or("nothing")
            ),
        }),
    }
}

fn as_xy(v: &Value) -> Result<(f64, f64)> {
    match v {
        Value::Point2D { x, y, .. } => Ok((*x, *y)),
        Value::Point3D { x, y, .. } => Ok((*x, *y)),
        other => Err(Error::TypeError { expected: "Point".into(), got: other.type_name().into() }),
    }
}

/// `point.withinBBox(point, lowerLeft, upperRight)`: true iff `point` falls
/// within the axis-aligned box, boundaries inclusive.
fn within_bbox(args: &[Value]) -> Result<Value> {
    if let Some(Value::Null) = args.first() {
        return Ok(Value::Null);
    }
    let (px, py) = as_xy(args.first().ok_or_else(|| Error::ArgumentError("point.withinBBox requires a point".into()))?)?;
    let (lx, ly) = as_xy(args.get(1).ok_or_else(|| Error::ArgumentError("point.withinBBox requires a lower-left point".into()))?)?;
    let (ux, uy) = as_xy(args.get(2).ok_or_else(|| Error::ArgumentError("point.withinBBox requires an upper-right point".into()))?)?;
    Ok(Value::Bool(px >= lx && px <= ux && py >= ly && py <= uy))
}

/// `point.withinPolygon(point, [v0, v1, ..., vn-1])`: standard ray-casting
/// point-in-polygon test over the vertex ring (not required to be closed).
fn within_polygon(args: &[Value]) -> Result<Value> {
    if let Some(Value::Null) = args.first() {
        return Ok(Value::Null);
    }
    let (px, py) = as_xy(args.first().ok_or_else(|| Error::ArgumentError("point.withinPolygon requires a point".into()))?)?;
    let polygon = match args.get(1) {
        Some(Value::List(l)) => l,
        other => return Err(Error::TypeError { expected: "List of Points".into(), got: other.map(|v| v.type_name()).unwrap_or("nothing").into() }),
    };
    if polygon.len() < 3 {
        return Err(Error::ArgumentError("point.withinPolygon requires at least 3 vertices".into()));
    }
    let vertices = polygon.iter().map(as_xy).collect::<Result<Vec<_>>>()?;

    let mut inside = false;
    let n = vertices.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > py) != (yj > py) {
            let x_intersect = xi + (py - yi) * (xj - xi) / (yj - yi);
            if px < x_intersect {
                inside = !inside;
            }
        }
        j = i;
    }
    Ok(Value::Bool(inside))
}

fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}
