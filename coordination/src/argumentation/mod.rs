//! Abstract argumentation (Dung semantics).
//!
//! ```text
//! arguments + attacks + validations
//!        │
//!        ▼  keep attacks with valid == true
//!   DungFramework ──► grounded labelling (IN / OUT / UNDEC)
//!        │
//!        └─────────► preferred extensions (grounded ∪ admissible UNDEC subsets)
//! ```

pub mod framework;
pub mod types;

pub use framework::{ArgumentationGraph, DungFramework, MAX_ENUMERATION_BITS};
pub use types::{
    Argument, ArgumentId, Attack, AttackTarget, AttackType, Label, Labelling, TargetComponent,
    ValidationResult,
};
