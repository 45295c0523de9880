use std::{error::Error, fmt};

/// Byte order of everything the assembler emits. The 6809 is big-endian.
pub type Endian = byteorder::BigEndian;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParseEnumError {
    pub value: String,
    pub enum_name: &'static str,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Failed to parse \"{}\" as {}.",
            &self.value, &self.enum_name
        )
    }
}

impl Error for ParseEnumError {
    fn description(&self) -> &str {
        "Failed to parse enum."
    }
}

pub trait EnumFromStr: Sized {
    fn from_str(s: &str) -> Result<Self, ParseEnumError>;
}

/// Implements [`EnumFromStr`] and [`std::str::FromStr`] for a fieldless enum,
/// matching variant names verbatim.
#[macro_export]
macro_rules! enum_from_str {
    ($e:ident { $($v:ident),+ $(,)? }) => {
        impl $crate::EnumFromStr for $e {
            fn from_str(s: &str) -> Result<Self, $crate::ParseEnumError> {
                match s {
                    $(stringify!($v) => Ok($e::$v),)+
                    _ => Err($crate::ParseEnumError {
                        value: s.to_owned(),
                        enum_name: stringify!($e),
                    }),
                }
            }
        }

        impl std::str::FromStr for $e {
            type Err = $crate::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$e as $crate::EnumFromStr>::from_str(s)
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Fruit {
        Apple,
        Pear,
    }

    crate::enum_from_str! { Fruit { Apple, Pear } }

    #[test]
    fn parses_variant_names() {
        assert_eq!("Apple".parse(), Ok(Fruit::Apple));
        assert_eq!("Pear".parse(), Ok(Fruit::Pear));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "Plum".parse::<Fruit>().unwrap_err();
        assert_eq!(err.value, "Plum");
        assert_eq!(err.enum_name, "Fruit");
    }
}
