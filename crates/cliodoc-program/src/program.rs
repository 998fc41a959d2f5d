//! Program and parameter definitions.

use crate::error::{ProgramError, ProgramResult};
use crate::value::ParameterType;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// A flag or positional argument of a [`Program`].
///
/// `value` is the static default. `raw` bypasses type rendering entirely,
/// which makes it possible to feed deliberately malformed input to the
/// program under test. `flag` overrides the `--name` token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// CLI token override (defaults to `--name`). Ignored for args.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flag: String,
    /// Short description of the chosen value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short: String,
    /// Semantic type.
    #[serde(default, rename = "type")]
    pub kind: ParameterType,
    /// Static default.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    /// Literal override.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
    /// Presence-only switch.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_value: bool,
}

impl Parameter {
    /// Create a parameter of type `kind` with a static default.
    pub fn new(name: impl Into<String>, kind: ParameterType, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            ..Self::default()
        }
    }

    /// Token used on the command line for this flag.
    pub fn flag_token(&self) -> String {
        if self.flag.is_empty() {
            format!("--{}", self.name)
        } else {
            self.flag.clone()
        }
    }
}

/// A declarative description of one executable invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    /// Registry key; also the executable searched on PATH when `path` is empty.
    pub name: String,
    /// Explicit executable location.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Leading positional tokens (subcommands).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Extra environment, overlaid on the inherited one.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Literal tokens inserted after the verbs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<Parameter>,
    /// Positional arguments, in command-line order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Parameter>,
    /// Piped to the child when non-empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdin: String,

    // Golden test expectations, checked by `cliodoc_exec::golden`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expected_stdout: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expected_error: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expected_status_code: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expected_files: BTreeMap<String, String>,
}

fn is_zero(code: &i32) -> bool {
    *code == 0
}

impl Program {
    /// Create an empty program with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Decode a program from YAML text. `origin` is only used in errors.
    pub fn from_yaml(yaml: &str, origin: impl AsRef<Path>) -> ProgramResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ProgramError::decode(origin.as_ref(), &e))
    }

    /// Decode a program from a reader.
    pub fn from_reader(reader: impl Read, origin: impl AsRef<Path>) -> ProgramResult<Self> {
        serde_yaml::from_reader(reader).map_err(|e| ProgramError::decode(origin.as_ref(), &e))
    }

    /// Whether any golden expectation is declared.
    pub fn has_expectations(&self) -> bool {
        !self.expected_stdout.is_empty()
            || !self.expected_error.is_empty()
            || self.expected_status_code != 0
            || !self.expected_files.is_empty()
    }

    fn flag_mut(&mut self, name: &str) -> ProgramResult<&mut Parameter> {
        let program = &self.name;
        self.flags
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| ProgramError::UnknownFlag {
                program: program.clone(),
                name: name.to_string(),
            })
    }

    fn arg_mut(&mut self, name: &str) -> ProgramResult<&mut Parameter> {
        let program = &self.name;
        self.args
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| ProgramError::UnknownArg {
                program: program.clone(),
                name: name.to_string(),
            })
    }

    /// Replace the static value of a flag.
    pub fn set_flag_value(&mut self, name: &str, value: impl Into<Value>) -> ProgramResult<()> {
        self.flag_mut(name)?.value = value.into();
        Ok(())
    }

    /// Replace the raw override of a flag.
    pub fn set_flag_raw(&mut self, name: &str, raw: impl Into<String>) -> ProgramResult<()> {
        self.flag_mut(name)?.raw = raw.into();
        Ok(())
    }

    /// Replace the static value of a positional argument.
    pub fn set_arg_value(&mut self, name: &str, value: impl Into<Value>) -> ProgramResult<()> {
        self.arg_mut(name)?.value = value.into();
        Ok(())
    }

    /// Replace the raw override of a positional argument.
    pub fn set_arg_raw(&mut self, name: &str, raw: impl Into<String>) -> ProgramResult<()> {
        self.arg_mut(name)?.raw = raw.into();
        Ok(())
    }

    /// Append literal tokens after the verbs.
    pub fn add_raw_flags<I, S>(&mut self, raw: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw_flags.extend(raw.into_iter().map(Into::into));
    }

    /// Whether `name` is a declared flag or argument.
    pub fn has_parameter(&self, name: &str) -> bool {
        self.flags.iter().chain(self.args.iter()).any(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LS: &str = r#"
name: ls
path: /bin/ls
description: list files
verbs: [sub]
env:
  LC_ALL: C
rawFlags: ["-1"]
flags:
  - name: all
    flag: -a
    noValue: true
  - name: width
    type: int
    value: 80
args:
  - name: dir
    type: file
    value: .
stdin: ""
expectedStdout: "a\nb\n"
expectedStatusCode: 2
expectedFiles:
  out.txt: hello
"#;

    #[test]
    fn test_decode_program() {
        let program = Program::from_yaml(LS, "ls.yaml").unwrap();
        assert_eq!(program.name, "ls");
        assert_eq!(program.path, "/bin/ls");
        assert_eq!(program.verbs, vec!["sub"]);
        assert_eq!(program.env.get("LC_ALL").map(String::as_str), Some("C"));
        assert_eq!(program.raw_flags, vec!["-1"]);
        assert_eq!(program.flags.len(), 2);
        assert!(program.flags[0].no_value);
        assert_eq!(program.flags[0].flag_token(), "-a");
        assert_eq!(program.flags[1].kind, ParameterType::Int);
        assert_eq!(program.flags[1].flag_token(), "--width");
        assert_eq!(program.args[0].kind, ParameterType::File);
        assert_eq!(program.expected_status_code, 2);
        assert_eq!(program.expected_files["out.txt"], "hello");
        assert!(program.has_expectations());
    }

    #[test]
    fn test_decode_error_carries_origin() {
        let err = Program::from_yaml("name: [unclosed", "broken.yaml").unwrap_err();
        match err {
            ProgramError::Decode { path, .. } => assert_eq!(path, Path::new("broken.yaml")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Program::from_yaml(LS, "ls.yaml").unwrap();
        let mut clone = original.clone();
        assert_eq!(clone, original);

        clone.flags[1].value = Value::from(120);
        clone.args[0].raw = "--bogus".to_string();
        clone.env.insert("EXTRA".into(), "1".into());
        clone.add_raw_flags(["-l"]);

        assert_eq!(original.flags[1].value, Value::from(80));
        assert!(original.args[0].raw.is_empty());
        assert!(!original.env.contains_key("EXTRA"));
        assert_eq!(original.raw_flags, vec!["-1"]);
    }

    #[test]
    fn test_setters() {
        let mut program = Program::from_yaml(LS, "ls.yaml").unwrap();
        program.set_flag_value("width", 100).unwrap();
        program.set_flag_raw("width", "wide").unwrap();
        program.set_arg_value("dir", "/tmp").unwrap();
        program.set_arg_raw("dir", "").unwrap();

        assert_eq!(program.flags[1].value, Value::from(100));
        assert_eq!(program.flags[1].raw, "wide");
        assert_eq!(program.args[0].value, Value::from("/tmp"));

        assert!(matches!(
            program.set_flag_value("nope", 1),
            Err(ProgramError::UnknownFlag { .. })
        ));
        assert!(matches!(
            program.set_arg_raw("width", "x"),
            Err(ProgramError::UnknownArg { .. })
        ));
    }

    #[test]
    fn test_serialize_skips_defaults() {
        let program = Program::new("echo");
        let yaml = serde_yaml::to_string(&program).unwrap();
        assert!(yaml.contains("name: echo"));
        assert!(!yaml.contains("expectedStatusCode"));
        assert!(!yaml.contains("flags"));
    }
}
