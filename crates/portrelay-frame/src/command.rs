use bytes::Bytes;

/// A named command with ordered, binary-safe arguments.
///
/// On the wire the name occupies element 0, so a command always encodes to
/// `1 + arguments().len()` elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Command {
    name: String,
    arguments: Vec<Bytes>,
}

impl Command {
    /// Create a command without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    /// Create a command from a name and an argument list.
    ///
    /// Arguments may be borrowed; each one is copied into its own buffer.
    /// Use [`Command::from_parts`] to hand over existing [`Bytes`] without
    /// copying.
    pub fn with_args<I, A>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        Self {
            name: name.into(),
            arguments: arguments
                .into_iter()
                .map(|arg| Bytes::copy_from_slice(arg.as_ref()))
                .collect(),
        }
    }

    pub fn from_parts(name: impl Into<String>, arguments: Vec<Bytes>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, argument: impl AsRef<[u8]>) -> Self {
        self.arguments
            .push(Bytes::copy_from_slice(argument.as_ref()));
        self
    }

    /// The command name (element 0 on the wire).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The arguments, in wire order.
    pub fn arguments(&self) -> &[Bytes] {
        &self.arguments
    }

    /// Argument `index` as UTF-8, or `None` if it is missing or not valid UTF-8.
    pub fn argument_str(&self, index: usize) -> Option<&str> {
        self.arguments
            .get(index)
            .and_then(|arg| std::str::from_utf8(arg).ok())
    }

    /// Number of elements this command occupies on the wire.
    pub fn element_count(&self) -> usize {
        1 + self.arguments.len()
    }

    /// Exact encoded size in bytes.
    pub fn wire_size(&self) -> usize {
        let elements = std::iter::once(self.name.len())
            .chain(self.arguments.iter().map(Bytes::len))
            .map(|len| 1 + decimal_len(len) + 1 + len + 1)
            .sum::<usize>();
        1 + decimal_len(self.element_count()) + 1 + elements
    }

    /// Split into name and arguments.
    pub fn into_parts(self) -> (String, Vec<Bytes>) {
        (self.name, self.arguments)
    }
}

fn decimal_len(value: usize) -> usize {
    value.checked_ilog10().map_or(1, |digits| digits as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    #[test]
    fn builder_appends_in_order() {
        let cmd = Command::new("say").arg("hello").arg(b"\x00\xff".to_vec());
        assert_eq!(cmd.name(), "say");
        assert_eq!(cmd.arguments().len(), 2);
        assert_eq!(cmd.argument_str(0), Some("hello"));
        assert_eq!(cmd.argument_str(1), None);
        assert_eq!(cmd.argument_str(2), None);
    }

    #[test]
    fn element_count_includes_name() {
        assert_eq!(Command::new("").element_count(), 1);
        assert_eq!(Command::with_args("x", ["a", "b"]).element_count(), 3);
    }

    #[test]
    fn wire_size_matches_encoding() {
        let cases = [
            Command::default(),
            Command::new("TestCommand"),
            Command::with_args("TestCommand", ["-t", "TestArgument"]),
            Command::with_args("big", [vec![b'x'; 1234]]),
        ];
        for cmd in cases {
            assert_eq!(cmd.wire_size(), encode(&cmd).len(), "{cmd:?}");
        }
    }

    #[test]
    fn arguments_can_be_borrowed_from_another_command() {
        let request = Command::with_args("ping", ["42"]);
        let payload = vec![0u8, 1, 2];
        let reply = Command::with_args("pong", [request.name()])
            .arg(request.arguments()[0].as_ref())
            .arg(payload.as_slice());
        drop(request);

        assert_eq!(reply.argument_str(0), Some("ping"));
        assert_eq!(reply.argument_str(1), Some("42"));
        assert_eq!(reply.arguments()[2].as_ref(), &[0u8, 1, 2]);
    }

    #[test]
    fn from_parts_keeps_buffers() {
        let shared = Bytes::from_static(b"shared");
        let cmd = Command::from_parts("n", vec![shared.clone()]);
        assert_eq!(cmd.arguments()[0].as_ptr(), shared.as_ptr());
    }

    #[test]
    fn into_parts_returns_owned_fields() {
        let (name, args) = Command::with_args("n", ["a"]).into_parts();
        assert_eq!(name, "n");
        assert_eq!(args, vec![Bytes::from_static(b"a")]);
    }
}
