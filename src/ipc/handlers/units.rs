use crate::curriculum::{append_unit, remove_unit, reorder_units, toggle_lock, toggle_sequential, ClassContext};
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::helpers::{
    class_context, db_read, db_write, opt_text, required_str, required_text, with_store, Handled,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Unit;
use serde_json::{json, Value};

fn class_units(store: &dyn Gateway, ctx: &ClassContext) -> Result<Vec<Unit>, HandlerErr> {
    Ok(ctx.scope(store.list_units(ctx.class_id()).map_err(db_read)?))
}

fn units_list(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    Ok(json!({ "units": class_units(store, &ctx)? }))
}

fn units_create(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let units = class_units(store, &ctx)?;
    let title = required_text(params, "title")?;
    let description = opt_text(params, "description")?.unwrap_or_default();
    let unit = append_unit(&ctx, &units, &title, &description);
    store.insert_unit(&unit).map_err(db_write)?;
    Ok(json!({ "unit": unit }))
}

fn units_update(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let unit_id = required_str(params, "unitId")?;
    let mut units = class_units(store, &ctx)?;
    let Some(unit) = units.iter_mut().find(|u| u.id == unit_id) else {
        return Err(CoreError::not_found("unit", unit_id).into());
    };
    if params.get("title").is_some() {
        unit.title = required_text(params, "title")?;
    }
    if params.get("description").is_some() {
        unit.description = opt_text(params, "description")?.unwrap_or_default();
    }
    match params.get("availableAt") {
        None => {}
        Some(Value::Null) => unit.available_at = None,
        Some(v) => {
            unit.available_at = Some(
                v.as_i64()
                    .ok_or_else(|| HandlerErr::bad_params("availableAt must be epoch milliseconds"))?,
            )
        }
    }
    store.update_unit(unit).map_err(db_write)?;
    Ok(json!({ "unit": unit }))
}

fn units_delete(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let unit_id = required_str(params, "unitId")?;
    let mut units = class_units(store, &ctx)?;
    let mut lessons = store.list_lessons(ctx.class_id()).map_err(db_read)?;
    let Some((removed, detached)) = remove_unit(&mut units, &mut lessons, &unit_id) else {
        return Err(CoreError::not_found("unit", unit_id).into());
    };
    store.delete_unit(&removed.id, &units).map_err(db_write)?;
    Ok(json!({ "units": units, "detachedLessonIds": detached }))
}

/// Unknown ids leave the order untouched and answer `changed: false`.
fn units_reorder(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let dragged = required_str(params, "draggedId")?;
    let target = required_str(params, "targetId")?;
    let mut units = class_units(store, &ctx)?;
    let changed = reorder_units(&mut units, &dragged, &target);
    if changed {
        store.save_units(&units).map_err(db_write)?;
    }
    Ok(json!({ "changed": changed, "units": units }))
}

fn toggle(store: &dyn Gateway, params: &Value, flip: fn(&mut [Unit], &str) -> Option<bool>) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let unit_id = required_str(params, "unitId")?;
    let mut units = class_units(store, &ctx)?;
    let Some(value) = flip(&mut units, &unit_id) else {
        return Err(CoreError::not_found("unit", unit_id).into());
    };
    let unit = units
        .iter()
        .find(|u| u.id == unit_id)
        .ok_or_else(|| CoreError::not_found("unit", unit_id.clone()))?;
    store.update_unit(unit).map_err(db_write)?;
    Ok(json!({ "unit": unit, "value": value }))
}

fn units_toggle_lock(store: &dyn Gateway, params: &Value) -> Handled {
    toggle(store, params, toggle_lock)
}

fn units_toggle_sequential(store: &dyn Gateway, params: &Value) -> Handled {
    toggle(store, params, toggle_sequential)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "units.list" => Some(with_store(state, req, units_list)),
        "units.create" => Some(with_store(state, req, units_create)),
        "units.update" => Some(with_store(state, req, units_update)),
        "units.delete" => Some(with_store(state, req, units_delete)),
        "units.reorder" => Some(with_store(state, req, units_reorder)),
        "units.toggleLock" => Some(with_store(state, req, units_toggle_lock)),
        "units.toggleSequential" => Some(with_store(state, req, units_toggle_sequential)),
        _ => None,
    }
}
