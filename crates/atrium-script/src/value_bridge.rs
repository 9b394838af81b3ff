//! Conversions between Lua values and [`atrium_tree`] domain types.
//!
//! Vectors and CFrames cross the boundary as plain tables (`{x, y, z}` and
//! `{position = Vec3, rotation = {m = {{...}, {...}, {...}}}}`) rather than
//! userdata, so scripts can build them with table literals.

use mlua::{Lua, Table, Value};

use atrium_tree::prelude::{AttributeValue, CFrame, Color, Rotation, Vec3};

use crate::error::ScriptError;

pub fn vec3_to_lua(lua: &Lua, v: Vec3) -> mlua::Result<Value> {
    let t = lua.create_table()?;
    t.set("x", v.x)?;
    t.set("y", v.y)?;
    t.set("z", v.z)?;
    Ok(Value::Table(t))
}

pub fn vec3_from_lua(value: &Value) -> Result<Vec3, ScriptError> {
    let t = as_table(value, "Vec3")?;
    Ok(Vec3::new(
        t.get::<f64>("x").map_err(|e| ScriptError::ValueError(e.to_string()))?,
        t.get::<f64>("y").map_err(|e| ScriptError::ValueError(e.to_string()))?,
        t.get::<f64>("z").map_err(|e| ScriptError::ValueError(e.to_string()))?,
    ))
}

pub fn rotation_to_lua(lua: &Lua, r: Rotation) -> mlua::Result<Value> {
    let rows = lua.create_table()?;
    for (i, row) in r.m.iter().enumerate() {
        let row_table = lua.create_table()?;
        for (j, value) in row.iter().enumerate() {
            row_table.set(j + 1, *value)?;
        }
        rows.set(i + 1, row_table)?;
    }
    let t = lua.create_table()?;
    t.set("m", rows)?;
    Ok(Value::Table(t))
}

pub fn rotation_from_lua(value: &Value) -> Result<Rotation, ScriptError> {
    let t = as_table(value, "Rotation")?;
    let rows: Table = t
        .get("m")
        .map_err(|e| ScriptError::ValueError(format!("Rotation.m: {e}")))?;
    let mut m = [[0.0; 3]; 3];
    for i in 0..3 {
        let row: Table = rows
            .get(i + 1)
            .map_err(|e| ScriptError::ValueError(format!("Rotation.m[{}]: {e}", i + 1)))?;
        for j in 0..3 {
            m[i][j] = row
                .get::<f64>(j + 1)
                .map_err(|e| ScriptError::ValueError(format!("Rotation.m[{}][{}]: {e}", i + 1, j + 1)))?;
        }
    }
    Ok(Rotation { m })
}

pub fn cframe_to_lua(lua: &Lua, c: CFrame) -> mlua::Result<Value> {
    let t = lua.create_table()?;
    t.set("position", vec3_to_lua(lua, c.position)?)?;
    t.set("rotation", rotation_to_lua(lua, c.rotation)?)?;
    Ok(Value::Table(t))
}

pub fn cframe_from_lua(value: &Value) -> Result<CFrame, ScriptError> {
    let t = as_table(value, "CFrame")?;
    let position: Value = t
        .get("position")
        .map_err(|e| ScriptError::ValueError(format!("CFrame.position: {e}")))?;
    let rotation: Value = t.get("rotation").unwrap_or(Value::Nil);
    let rotation = if matches!(rotation, Value::Nil) {
        Rotation::IDENTITY
    } else {
        rotation_from_lua(&rotation)?
    };
    Ok(CFrame::new(vec3_from_lua(&position)?, rotation))
}

pub fn color_to_lua(lua: &Lua, c: Color) -> mlua::Result<Value> {
    let t = lua.create_table()?;
    t.set("r", c.r)?;
    t.set("g", c.g)?;
    t.set("b", c.b)?;
    Ok(Value::Table(t))
}

pub fn color_from_lua(value: &Value) -> Result<Color, ScriptError> {
    let t = as_table(value, "Color")?;
    Ok(Color::new(
        t.get::<f64>("r").map_err(|e| ScriptError::ValueError(e.to_string()))?,
        t.get::<f64>("g").map_err(|e| ScriptError::ValueError(e.to_string()))?,
        t.get::<f64>("b").map_err(|e| ScriptError::ValueError(e.to_string()))?,
    ))
}

/// Convert an [`AttributeValue`] into the Lua value scripts read back from
/// `GetAttribute`.
pub fn attribute_to_lua(lua: &Lua, value: &AttributeValue) -> mlua::Result<Value> {
    match value {
        AttributeValue::Number(n) => Ok(Value::Number(*n)),
        AttributeValue::Bool(b) => Ok(Value::Boolean(*b)),
        AttributeValue::String(s) => Ok(Value::String(lua.create_string(s)?)),
        AttributeValue::Vector(v) => vec3_to_lua(lua, *v),
        AttributeValue::Color(c) => color_to_lua(lua, *c),
    }
}

/// Convert a Lua value passed to `SetAttribute` into an [`AttributeValue`].
///
/// A plain table is assumed to be a vector unless it has an `r`/`g`/`b`
/// shape, in which case it's a color.
pub fn attribute_from_lua(value: &Value) -> Result<AttributeValue, ScriptError> {
    match value {
        Value::Number(n) => Ok(AttributeValue::Number(*n)),
        Value::Integer(i) => Ok(AttributeValue::Number(*i as f64)),
        Value::Boolean(b) => Ok(AttributeValue::Bool(*b)),
        Value::String(s) => Ok(AttributeValue::String(
            s.to_str()
                .map_err(|e| ScriptError::ValueError(e.to_string()))?
                .to_string(),
        )),
        Value::Table(t) => {
            if t.contains_key("r").unwrap_or(false) {
                Ok(AttributeValue::Color(color_from_lua(value)?))
            } else {
                Ok(AttributeValue::Vector(vec3_from_lua(value)?))
            }
        }
        other => Err(ScriptError::ValueError(format!(
            "unsupported attribute value type: {}",
            other.type_name()
        ))),
    }
}

fn as_table<'a>(value: &'a Value, what: &str) -> Result<&'a Table, ScriptError> {
    match value {
        Value::Table(t) => Ok(t),
        other => Err(ScriptError::ValueError(format!(
            "expected a table for {what}, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_round_trips_through_lua_table() {
        let lua = Lua::new();
        let v = Vec3::new(1.0, 2.0, 3.0);
        let lua_value = vec3_to_lua(&lua, v).unwrap();
        let back = vec3_from_lua(&lua_value).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn cframe_round_trips_through_lua_table() {
        let lua = Lua::new();
        let c = CFrame::identity_at(Vec3::new(1.0, 2.0, 3.0));
        let lua_value = cframe_to_lua(&lua, c).unwrap();
        let back = cframe_from_lua(&lua_value).unwrap();
        assert_eq!(c, back);
    }

    #[test]
    fn attribute_number_round_trips() {
        let lua = Lua::new();
        let attr = AttributeValue::Number(42.5);
        let lua_value = attribute_to_lua(&lua, &attr).unwrap();
        let back = attribute_from_lua(&lua_value).unwrap();
        assert_eq!(attr, back);
    }

    #[test]
    fn color_table_is_distinguished_from_vector() {
        let lua = Lua::new();
        let color = AttributeValue::Color(Color::new(0.1, 0.2, 0.3));
        let lua_value = attribute_to_lua(&lua, &color).unwrap();
        let back = attribute_from_lua(&lua_value).unwrap();
        assert_eq!(color, back);
    }
}
