use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::apkinfo::{ApkInfo, XrefEntry};
use crate::instruction::Instruction;
use crate::method::MethodRef;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("reading fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing fixture {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Wire format for a pre-digested application bundle. This is the shape
/// a separate decompilation/disassembly tool would emit — building that
/// tool is out of scope here (see crate-level Non-goals); `FixtureApkInfo`
/// only consumes its output.
#[derive(Debug, Deserialize)]
struct FixtureFile {
    md5: String,
    filename: String,
    filesize: u64,
    #[serde(default)]
    permissions: BTreeSet<String>,
    #[serde(default)]
    methods: Vec<MethodFixture>,
}

#[derive(Debug, Deserialize)]
struct MethodFixture {
    class_name: String,
    name: String,
    #[serde(default)]
    callers: Vec<MethodKeyFixture>,
    #[serde(default)]
    bytecode: Vec<InstructionFixture>,
    #[serde(default)]
    xref_to: Vec<XrefFixture>,
}

#[derive(Debug, Deserialize, Clone)]
struct MethodKeyFixture {
    class_name: String,
    name: String,
}

impl From<MethodKeyFixture> for MethodRef {
    fn from(m: MethodKeyFixture) -> Self {
        MethodRef::new(m.class_name, m.name)
    }
}

#[derive(Debug, Deserialize)]
struct InstructionFixture {
    mnemonic: String,
    #[serde(default)]
    registers: Vec<String>,
    #[serde(default)]
    parameter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XrefFixture {
    #[serde(default)]
    source: Option<MethodKeyFixture>,
    callee: MethodKeyFixture,
    offset: u64,
}

struct MethodEntry {
    callers: Vec<MethodRef>,
    bytecode: Vec<Instruction>,
    xref_to: Vec<XrefEntry>,
}

/// In-memory [`ApkInfo`] backed by a JSON fixture produced up front by a
/// disassembly pass external to this crate.
pub struct FixtureApkInfo {
    md5: String,
    filename: String,
    filesize: u64,
    permissions: BTreeSet<String>,
    methods: HashMap<(String, String), MethodEntry>,
}

impl FixtureApkInfo {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path_ref = path.as_ref();
        let content =
            std::fs::read_to_string(path_ref).map_err(|source| FixtureError::Io {
                path: path_ref.display().to_string(),
                source,
            })?;
        Self::from_json_str(&content, &path_ref.display().to_string())
    }

    pub fn from_json_str(content: &str, label: &str) -> Result<Self, FixtureError> {
        let raw: FixtureFile =
            serde_json::from_str(content).map_err(|source| FixtureError::Parse {
                path: label.to_string(),
                source,
            })?;

        let mut methods = HashMap::with_capacity(raw.methods.len());
        for m in raw.methods {
            let key = (m.class_name.clone(), m.name.clone());
            let entry = MethodEntry {
                callers: m.callers.into_iter().map(MethodRef::from).collect(),
                bytecode: m
                    .bytecode
                    .into_iter()
                    .map(|i| Instruction::new(i.mnemonic, i.registers, i.parameter))
                    .collect(),
                xref_to: m
                    .xref_to
                    .into_iter()
                    .map(|x| XrefEntry {
                        source: x.source.map(MethodRef::from),
                        callee: MethodRef::from(x.callee),
                        offset: x.offset,
                    })
                    .collect(),
            };
            methods.insert(key, entry);
        }

        Ok(Self {
            md5: raw.md5,
            filename: raw.filename,
            filesize: raw.filesize,
            permissions: raw.permissions,
            methods,
        })
    }
}

impl ApkInfo for FixtureApkInfo {
    fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    fn find_method(&self, class_name: &str, method_name: &str) -> Vec<MethodRef> {
        let key = (class_name.to_string(), method_name.to_string());
        match self.methods.contains_key(&key) {
            true => vec![MethodRef::new(class_name, method_name)],
            false => Vec::new(),
        }
    }

    fn upperfunc(&self, class_name: &str, method_name: &str) -> Vec<MethodRef> {
        let key = (class_name.to_string(), method_name.to_string());
        self.methods
            .get(&key)
            .map(|e| e.callers.clone())
            .unwrap_or_default()
    }

    fn method_bytecode<'a>(
        &'a self,
        method: &MethodRef,
    ) -> Box<dyn Iterator<Item = Instruction> + 'a> {
        let key = (method.class_name.clone(), method.name.clone());
        match self.methods.get(&key) {
            Some(entry) => Box::new(entry.bytecode.iter().cloned()),
            None => Box::new(std::iter::empty()),
        }
    }

    fn xref_to(&self, method: &MethodRef) -> Vec<XrefEntry> {
        let key = (method.class_name.clone(), method.name.clone());
        self.methods
            .get(&key)
            .map(|e| e.xref_to.clone())
            .unwrap_or_default()
    }

    fn md5(&self) -> &str {
        &self.md5
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn filesize(&self) -> u64 {
        self.filesize
    }
}
