use internment::Intern;
use std::fmt;

/// Identifies where parsed text came from (the REPL, a config file, a test)
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SrcId(Intern<Vec<String>>);

impl SrcId {
    pub fn empty() -> Self {
        Self(Intern::new(Vec::new()))
    }

    pub fn repl() -> Self {
        Self(Intern::new(vec!["repl".to_string()]))
    }

    pub fn named(name: &str) -> Self {
        Self(Intern::new(name.split('/').map(str::to_string).collect()))
    }
}

impl fmt::Display for SrcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "?")
        } else {
            write!(f, "{}", self.0.join("/"))
        }
    }
}

impl fmt::Debug for SrcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
