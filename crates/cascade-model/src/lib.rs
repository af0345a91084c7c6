pub mod apkinfo;
pub mod fixture;
pub mod instruction;
pub mod method;
pub mod rule;

pub use apkinfo::{ApkInfo, XrefEntry};
pub use fixture::{FixtureApkInfo, FixtureError};
pub use instruction::{Instruction, Mnemonic};
pub use method::MethodRef;
pub use rule::{CheckItem, Rule};
