// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod fetch;
pub mod filter;
pub mod forms;
pub mod ids;
pub mod model;
pub mod page_range;
pub mod paging;
pub mod resolver;
pub mod screen;
pub mod validation;

pub use fetch::*;
pub use filter::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use page_range::*;
pub use paging::*;
pub use resolver::*;
pub use screen::*;
pub use validation::*;
