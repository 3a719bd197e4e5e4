pub use std::{collections::HashMap, sync::Arc, time::Duration};

pub use anyhow::Context;
pub use chrono::{DateTime, Utc};
pub use dashmap::DashMap;
pub use tracing::{debug, error, info, warn};

pub use crate::error::{Error, Result};
