mod bindings;
mod resources;

pub use resources::ResourceDeclarations;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use mlua::{Error as LuaError, Lua, LuaOptions, StdLib, Table, Value};

use crate::dispatch::{CallbackInvoker, InvokeOutcome};
use crate::events::{Callback, EventRecord, FieldValue};
use crate::media::MediaHandle;

/// Owns the Lua state the user script runs in.
pub struct ScriptHost {
    lua: Lua,
}

impl ScriptHost {
    pub fn new() -> Result<Self> {
        let lua = Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default())
            .context("initialising Lua runtime with standard libraries")?;
        Ok(Self { lua })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Registers `play`, `loop`, `stop` and `display` against `media`.
    pub fn install_media_bindings(&self, media: MediaHandle) -> Result<()> {
        bindings::install_media_functions(&self.lua, media)
            .context("registering media functions in Lua")
    }

    pub fn load_script(&self, path: &Path) -> Result<()> {
        let source =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.exec_source(&name, &source)
            .with_context(|| format!("executing {}", path.display()))
    }

    pub fn exec_source(&self, name: &str, source: &str) -> Result<()> {
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .map_err(|err| anyhow::anyhow!(describe_lua_error(&err)))
    }

    /// Reads `sample_map` and `image_map`, creating empty tables for whichever
    /// the script left undefined.
    pub fn declared_resources(&self) -> Result<ResourceDeclarations> {
        resources::read_declarations(&self.lua).context("reading sample_map/image_map")
    }

    fn has_callback(&self, callback: Callback) -> bool {
        matches!(
            self.lua.globals().get::<_, Value>(callback.name()),
            Ok(Value::Function(_))
        )
    }

    /// Callbacks the loaded script defines as functions, in dispatch-table order.
    pub fn defined_callbacks(&self) -> Vec<Callback> {
        Callback::ALL
            .into_iter()
            .filter(|callback| self.has_callback(*callback))
            .collect()
    }
}

impl CallbackInvoker for ScriptHost {
    fn invoke(&mut self, callback: Callback, record: &EventRecord) -> InvokeOutcome {
        let handler = match self.lua.globals().get::<_, Value>(callback.name()) {
            Ok(Value::Nil) => return InvokeOutcome::Skipped,
            Ok(Value::Function(function)) => function,
            Ok(other) => {
                return InvokeOutcome::Failed(format!(
                    "attempt to call {} (a {} value)",
                    callback.name(),
                    other.type_name()
                ))
            }
            Err(err) => return InvokeOutcome::Failed(describe_lua_error(&err)),
        };
        let result = record_table(&self.lua, record).and_then(|table| handler.call::<_, ()>(table));
        match result {
            Ok(()) => InvokeOutcome::Called,
            Err(err) => InvokeOutcome::Failed(describe_lua_error(&err)),
        }
    }
}

fn record_table<'lua>(lua: &'lua Lua, record: &EventRecord) -> mlua::Result<Table<'lua>> {
    let table = lua.create_table()?;
    for (name, value) in record.fields() {
        match value {
            FieldValue::Integer(number) => table.set(name, number)?,
            FieldValue::Text(text) => table.set(name, text)?,
        }
    }
    Ok(table)
}

fn describe_lua_error(err: &LuaError) -> String {
    match err {
        LuaError::RuntimeError(message) | LuaError::SyntaxError { message, .. } => message.clone(),
        LuaError::CallbackError { cause, .. } => describe_lua_error(cause),
        other => other.to_string(),
    }
}
