/// A cursor over a byte array
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor<T> {
  t: T,
  cursor: usize,
  len: usize,
}

impl<T: AsRef<[u8]>> Cursor<T> {
  pub(crate) fn new(t: T) -> Cursor<T> {
    let len = t.as_ref().len();
    Cursor { t, cursor: 0, len }
  }

  fn peek_(len: usize, cursor: usize, t: &T, n: usize) -> Option<&[u8]> {
    if n > len - cursor {
      None
    } else {
      Some(&t.as_ref()[cursor..cursor + n])
    }
  }

  /// Take the next byte in the cursor, returning None
  /// if the cursor is exhausted.
  pub(crate) fn next(&mut self) -> Option<u8> {
    self.take_exact(1).and_then(|a| match a {
                        | &[a] => Some(a),
                        | _ => None,
                      })
  }

  /// Look at the next byte without consuming it
  pub(crate) fn peek_next(&self) -> Option<u8> {
    Self::peek_(self.len, self.cursor, &self.t, 1).and_then(|a| a.first().copied())
  }

  /// Take `n` bytes from the cursor, returning None if
  /// the end of the buffer is encountered.
  pub(crate) fn take_exact(&mut self, n: usize) -> Option<&[u8]> {
    Self::peek_(self.len, self.cursor, &self.t, n).map(|a| {
                                                    self.cursor += n;
                                                    a
                                                  })
  }

  /// Consume everything left in the buffer
  pub(crate) fn take_until_end(&mut self) -> &[u8] {
    let rest = &self.t.as_ref()[self.cursor..];
    self.cursor = self.len;
    rest
  }

  pub(crate) fn is_exhausted(&self) -> bool {
    self.cursor >= self.len
  }

  pub(crate) fn remaining(&self) -> usize {
    self.len - self.cursor
  }
}
