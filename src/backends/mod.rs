// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! The backend layer hides hardware access behind traits so the session
//! controller can be driven by a platform camera stack or by the in-process
//! synthetic camera:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Session controller                │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  Platform camera │  │    Synthetic    │  │
//! │  │  (host provided) │  │  (CLI / tests)  │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod camera;
