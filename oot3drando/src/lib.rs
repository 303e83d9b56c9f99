// TODO: consider removing this later. It's not a bad lint but I don't want to deal with it now.
#![allow(clippy::too_many_arguments)]

pub mod randomize;
pub mod settings;
pub mod spoiler_log;
pub mod traverse;
