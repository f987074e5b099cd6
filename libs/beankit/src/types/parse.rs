//! Parser for type expressions such as `Map<String, List<T>>[]`.

use thiserror::Error;

use super::hierarchy::DEFAULT_MAX_DEPTH;
use super::{RawClass, Type, TypeVariable};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of type expression '{input}'")]
    UnexpectedEnd { input: String },
    #[error("unexpected '{found}' at offset {offset} in '{input}'")]
    Unexpected {
        input: String,
        found: char,
        offset: usize,
    },
    #[error("type variable '{name}' cannot take type arguments")]
    ArgumentsOnVariable { name: String },
    #[error("type expression '{input}' nests deeper than {limit} levels")]
    TooDeep { input: String, limit: usize },
}

/// Parse a type expression.
///
/// Identifiers naming one of `type_params` become type variables; every other
/// identifier is a class name.
pub fn parse_type(input: &str, type_params: &[TypeVariable]) -> Result<Type, ParseError> {
    let mut parser = Parser {
        input,
        chars: input.char_indices().collect(),
        pos: 0,
        depth: 0,
        type_params,
    };
    let ty = parser.parse()?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(ty),
        Some((offset, found)) => Err(ParseError::Unexpected {
            input: input.to_owned(),
            found,
            offset,
        }),
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    depth: usize,
    type_params: &'a [TypeVariable],
}

impl Parser<'_> {
    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some((_, c)) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn end(&self) -> ParseError {
        ParseError::UnexpectedEnd {
            input: self.input.to_owned(),
        }
    }

    fn unexpected(&self, offset: usize, found: char) -> ParseError {
        ParseError::Unexpected {
            input: self.input.to_owned(),
            found,
            offset,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ParseError> {
        self.skip_ws();
        match self.peek() {
            Some((_, c)) if c == want => {
                self.pos += 1;
                Ok(())
            }
            Some((offset, c)) => Err(self.unexpected(offset, c)),
            None => Err(self.end()),
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        let mut out = String::new();
        while let Some((offset, c)) = self.peek() {
            let ok = if out.is_empty() {
                c.is_alphabetic() || c == '_' || c == '$'
            } else {
                c.is_alphanumeric() || matches!(c, '_' | '$' | '.')
            };
            if !ok {
                if out.is_empty() {
                    return Err(self.unexpected(offset, c));
                }
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        if out.is_empty() {
            return Err(self.end());
        }
        Ok(out)
    }

    fn parse(&mut self) -> Result<Type, ParseError> {
        if self.depth >= DEFAULT_MAX_DEPTH {
            return Err(ParseError::TooDeep {
                input: self.input.to_owned(),
                limit: DEFAULT_MAX_DEPTH,
            });
        }
        self.depth += 1;
        let ty = self.parse_nested();
        self.depth -= 1;
        ty
    }

    fn parse_nested(&mut self) -> Result<Type, ParseError> {
        let name = self.ident()?;
        let variable = self.type_params.iter().find(|v| *v.name == *name).cloned();

        self.skip_ws();
        let mut ty = if matches!(self.peek(), Some((_, '<'))) {
            if variable.is_some() {
                return Err(ParseError::ArgumentsOnVariable { name });
            }
            self.pos += 1;
            let mut args = vec![self.parse()?];
            loop {
                self.skip_ws();
                match self.peek() {
                    Some((_, ',')) => {
                        self.pos += 1;
                        args.push(self.parse()?);
                    }
                    Some((_, '>')) => {
                        self.pos += 1;
                        break;
                    }
                    Some((offset, c)) => return Err(self.unexpected(offset, c)),
                    None => return Err(self.end()),
                }
            }
            Type::parameterized(&name, args)
        } else {
            match variable {
                Some(var) => Type::Variable(var),
                None => Type::Class(RawClass::named(&name)),
            }
        };

        loop {
            self.skip_ws();
            if !matches!(self.peek(), Some((_, '['))) {
                break;
            }
            self.pos += 1;
            self.expect(']')?;
            ty = match ty {
                Type::Class(c) => Type::Class(c.array_of()),
                other => Type::array(other),
            };
        }
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_arguments_and_variables() {
        let t = TypeVariable::new(RawClass::named("Box"), "T");
        let ty = parse_type("Map<String, List<T>>", std::slice::from_ref(&t)).unwrap();
        assert_eq!(
            ty,
            Type::parameterized(
                "Map",
                [
                    Type::class("String"),
                    Type::parameterized("List", [Type::Variable(t)])
                ]
            )
        );
    }

    #[test]
    fn arrays_of_classes_stay_classes() {
        assert_eq!(
            parse_type("Foo[][]", &[]).unwrap(),
            Type::Class(RawClass::named("Foo").array_of().array_of())
        );
        assert_eq!(
            parse_type("List<Foo>[]", &[]).unwrap(),
            Type::array(Type::parameterized("List", [Type::class("Foo")]))
        );
    }

    #[test]
    fn rejects_trailing_garbage() {
        let err = parse_type("List<Foo>>", &[]).unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { found: '>', .. }));
        assert!(matches!(
            parse_type("List<Foo", &[]).unwrap_err(),
            ParseError::UnexpectedEnd { .. }
        ));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let levels = DEFAULT_MAX_DEPTH + 1;
        let input = format!("{}Leaf{}", "A<".repeat(levels), ">".repeat(levels));
        assert!(matches!(
            parse_type(&input, &[]).unwrap_err(),
            ParseError::TooDeep { limit, .. } if limit == DEFAULT_MAX_DEPTH
        ));

        let levels = DEFAULT_MAX_DEPTH - 1;
        let input = format!("{}Leaf{}", "A<".repeat(levels), ">".repeat(levels));
        assert!(parse_type(&input, &[]).is_ok());
    }
}
