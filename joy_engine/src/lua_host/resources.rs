use log::warn;
use mlua::{Lua, Result as LuaResult, Value};

use crate::slots::Handle;

pub const SAMPLE_MAP: &str = "sample_map";
pub const IMAGE_MAP: &str = "image_map";

/// Handle-to-path declarations found in the script globals, sorted by handle.
///
/// Handles are not range-checked here; the slot tables reject them on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDeclarations {
    pub samples: Vec<(Handle, String)>,
    pub images: Vec<(Handle, String)>,
}

pub(super) fn read_declarations(lua: &Lua) -> LuaResult<ResourceDeclarations> {
    Ok(ResourceDeclarations {
        samples: read_map(lua, SAMPLE_MAP)?,
        images: read_map(lua, IMAGE_MAP)?,
    })
}

fn read_map(lua: &Lua, global: &str) -> LuaResult<Vec<(Handle, String)>> {
    let globals = lua.globals();
    let table = match globals.get::<_, Value>(global)? {
        Value::Table(table) => table,
        Value::Nil => {
            let table = lua.create_table()?;
            globals.set(global, table.clone())?;
            table
        }
        other => {
            warn!(
                "{global} is a {} value, expected a table; ignoring it",
                other.type_name()
            );
            return Ok(Vec::new());
        }
    };

    let mut entries = Vec::new();
    for pair in table.pairs::<Value, Value>() {
        let (key, value) = match pair {
            Ok(pair) => pair,
            Err(err) => {
                warn!("{global}: skipping unreadable entry: {err}");
                continue;
            }
        };
        let handle = match key {
            Value::Integer(handle) => handle,
            Value::Number(number) if number.fract() == 0.0 => number as Handle,
            other => {
                warn!("{global}: skipping non-integer key {other:?}");
                continue;
            }
        };
        let path = match value {
            Value::String(path) => match path.to_str() {
                Ok(path) => path.to_string(),
                Err(err) => {
                    warn!("{global}[{handle}]: path is not valid UTF-8 ({err}); skipping it");
                    continue;
                }
            },
            other => {
                warn!(
                    "{global}[{handle}]: expected a path string, found a {} value",
                    other.type_name()
                );
                continue;
            }
        };
        entries.push((handle, path));
    }
    entries.sort_by_key(|(handle, _)| *handle);
    Ok(entries)
}
