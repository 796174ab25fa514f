// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod api;
pub mod forms;
pub mod ids;
pub mod layout;
pub mod model;
pub mod money;
pub mod price_editor;
pub mod rows;
pub mod slug;
pub mod state;
pub mod tag_editor;

pub use forms::*;
pub use ids::*;
pub use model::*;
pub use state::*;
