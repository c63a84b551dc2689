// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
mod flags;
pub use flags::WireFlagSet;
mod string;
pub use string::WireString;
mod uuid;
pub use uuid::WireUuid;
mod vec;
pub use vec::WireVec;
