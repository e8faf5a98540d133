pub(crate) mod create;
pub(crate) mod dump;
pub(crate) mod lookup;
pub(crate) mod path_helpers;
pub(crate) mod scan;
pub(crate) mod verify;

pub(crate) use create::command_create;
pub(crate) use dump::command_dump;
pub(crate) use lookup::command_lookup;
pub(crate) use scan::command_scan;
pub(crate) use verify::command_verify;
