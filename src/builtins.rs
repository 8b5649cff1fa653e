//! The fixed builtin-function table shared by the parser (name → builtin
//! recognition), the type pass (signature checking), the code generator
//! (`CALL_BUILTIN idx` emission) and the VM (dispatch).
use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    ToString,
    Length,
    Clone,
    Append,
    Random,
}

impl Builtin {
    pub const COUNT: usize = 6;

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Self::Print),
            1 => Some(Self::ToString),
            2 => Some(Self::Length),
            3 => Some(Self::Clone),
            4 => Some(Self::Append),
            5 => Some(Self::Random),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::ToString => "to_string",
            Self::Length => "length",
            Self::Clone => "clone",
            Self::Append => "append",
            Self::Random => "random",
        }
    }

    /// Fixed arity for builtins that take one; `random` takes two and is
    /// handled separately by callers that need it.
    pub fn arity(self) -> usize {
        match self {
            Self::Print | Self::ToString | Self::Length | Self::Clone => 1,
            Self::Append => 2,
            Self::Random => 2,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        BY_NAME.get(name).copied()
    }
}

static BY_NAME: Lazy<std::collections::HashMap<&'static str, Builtin>> = Lazy::new(|| {
    use Builtin::*;
    [Print, ToString, Length, Clone, Append, Random]
        .into_iter()
        .map(|b| (b.name(), b))
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_round_trips_through_its_index() {
        for idx in 0..Builtin::COUNT as u8 {
            let b = Builtin::from_index(idx).unwrap();
            assert_eq!(b.index(), idx);
        }
    }

    #[test]
    fn names_resolve_back_to_the_same_builtin() {
        assert_eq!(Builtin::by_name("print"), Some(Builtin::Print));
        assert_eq!(Builtin::by_name("clone"), Some(Builtin::Clone));
        assert_eq!(Builtin::by_name("nope"), None);
    }
}
