use croak_msg::{Message, Type};

/// One-line summary of a message for log records
///
/// e.g. `Con 0.01 "a/b" id=42 token=[1, 2] with 0 byte payload`
pub(crate) fn msg_summary(msg: &Message) -> String {
  let ty = match msg.ty {
    | Type::Con => "Con",
    | Type::Non => "Non",
    | Type::Ack => "Ack",
    | Type::Reset => "Reset",
  };

  format!("{} {} {:?} id={} token={:?} with {} byte payload",
          ty,
          msg.code,
          msg.path_string(),
          msg.id.0,
          msg.token.as_bytes(),
          msg.payload.0.len())
}

#[cfg(test)]
mod tests {
  use croak_msg::{Code, Id, Token};

  use super::*;

  #[test]
  fn summary() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(42), Token::from_bytes(&[1, 2]).unwrap());
    msg.set_path("a/b");
    assert_eq!(msg_summary(&msg),
               "Con 0.01 \"a/b\" id=42 token=[1, 2] with 0 byte payload");
  }
}
