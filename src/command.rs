use core::fmt::{self, Display, Formatter};

/// One parsed command line.
///
/// The verb is the leading run of non-space, non-colon characters. The
/// remainder is re-tokenized with space and colon as separators, except
/// inside an angle-bracket pair, where the contents (embedded spaces
/// included) form a single token with the brackets stripped. This keeps
/// `MAIL FROM:<a b@x.com> SIZE=123` as `["FROM", "a b@x.com", "SIZE=123"]`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Command {
    verb: String,
    arguments_text: String,
    arguments: Vec<String>,
    valid: bool,
    empty: bool,
}

impl Command {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        if line.is_empty() {
            return Self {
                verb: String::new(),
                arguments_text: String::new(),
                arguments: Vec::new(),
                valid: false,
                empty: true,
            };
        }

        // A line that opens with a separator has no verb to dispatch on
        if line.starts_with([' ', ':']) {
            return Self {
                verb: String::new(),
                arguments_text: line.to_string(),
                arguments: Vec::new(),
                valid: false,
                empty: false,
            };
        }

        let verb_end = line.find([' ', ':']).unwrap_or(line.len());
        let verb = line[..verb_end].to_string();
        let arguments_text = line[verb_end..]
            .trim_start_matches([' ', ':'])
            .to_string();
        let arguments = tokenize(&arguments_text);

        Self {
            verb,
            arguments_text,
            arguments,
            valid: true,
            empty: false,
        }
    }

    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The raw remainder of the line after the verb and its separators.
    #[must_use]
    pub fn arguments_text(&self) -> &str {
        &self.arguments_text
    }

    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.empty
    }
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        if self.arguments_text.is_empty() {
            fmt.write_str(&self.verb)
        } else {
            write!(fmt, "{} {}", self.verb, self.arguments_text)
        }
    }
}

/// Split argument text on spaces and colons, treating a balanced
/// angle-bracket pair as one verbatim token with the outermost brackets
/// stripped. An unterminated `<` keeps the rest of the line in the token.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut started = false;

    for ch in text.chars() {
        match ch {
            '<' => {
                if depth > 0 {
                    current.push(ch);
                }
                depth += 1;
                started = true;
            }
            '>' if depth > 0 => {
                depth -= 1;
                if depth > 0 {
                    current.push(ch);
                }
            }
            ' ' | ':' if depth == 0 => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            _ => {
                current.push(ch);
                started = true;
            }
        }
    }

    if started {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Command;

    #[test]
    fn empty_line() {
        let command = Command::parse("");
        assert!(command.is_empty());
        assert!(!command.is_valid());
    }

    #[test]
    fn verb_only() {
        let command = Command::parse("QUIT");
        assert!(command.is_valid());
        assert_eq!(command.verb(), "QUIT");
        assert!(command.arguments().is_empty());
    }

    #[test]
    fn verb_and_arguments() {
        let command = Command::parse("EHLO client.example.com");
        assert_eq!(command.verb(), "EHLO");
        assert_eq!(command.arguments_text(), "client.example.com");
        assert_eq!(command.arguments(), ["client.example.com"]);
    }

    #[test]
    fn colon_separates_verb() {
        let command = Command::parse("MAIL FROM:<test@example.com>");
        assert_eq!(command.verb(), "MAIL");
        assert_eq!(command.arguments(), ["FROM", "test@example.com"]);
    }

    #[test]
    fn bracketed_address_with_space_is_one_token() {
        let command = Command::parse("MAIL FROM:<a b@x.com>");
        assert_eq!(command.arguments(), ["FROM", "a b@x.com"]);
    }

    #[test]
    fn parameters_stay_whole() {
        let command = Command::parse("MAIL FROM:<test@example.com> SIZE=123 BODY=8BITMIME");
        assert_eq!(
            command.arguments(),
            ["FROM", "test@example.com", "SIZE=123", "BODY=8BITMIME"]
        );
    }

    #[test]
    fn null_reverse_path_yields_empty_token() {
        let command = Command::parse("MAIL FROM:<>");
        assert_eq!(command.arguments(), ["FROM", ""]);
    }

    #[test]
    fn nested_brackets_balance() {
        let command = Command::parse("X <a<b c>d>");
        assert_eq!(command.arguments(), ["a<b c>d"]);
    }

    #[test]
    fn unterminated_bracket_consumes_remainder() {
        let command = Command::parse("MAIL FROM:<oops no close SIZE=1");
        assert_eq!(command.arguments(), ["FROM", "oops no close SIZE=1"]);
    }

    #[test]
    fn leading_separator_is_invalid() {
        let command = Command::parse(" MAIL");
        assert!(!command.is_valid());
        assert!(!command.is_empty());
    }

    #[test]
    fn multiple_separators_collapse() {
        let command = Command::parse("RCPT TO: <test@example.com>");
        assert_eq!(command.arguments(), ["TO", "test@example.com"]);
    }
}
