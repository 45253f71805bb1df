// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod drafts;
pub mod grid;
pub mod ids;
pub mod model;
pub mod state;

pub use drafts::*;
pub use grid::*;
pub use ids::*;
pub use model::*;
pub use state::*;
