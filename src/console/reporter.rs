use std::fmt::Display;

pub enum ReplyKind {
    Done,
    /// Nothing had to change, e.g. revoking a source that was never allowed
    NoOp,
    Failed,
    /// Not a reply: something happened on its own, like a grant running out
    Notice,
    Detail,
}

/// Writes one line per reply to stdout, marked by kind.
pub struct Reporter {}

impl Reporter {
    pub fn reply<M: Display>(&self, kind: ReplyKind, message: M) {
        println!("{}", Self::line(kind, message));
    }

    fn line<M: Display>(kind: ReplyKind, message: M) -> String {
        let marker = match kind {
            ReplyKind::Done => "<-",
            ReplyKind::NoOp => "<~",
            ReplyKind::Failed => "<!",
            ReplyKind::Notice => "<*",
            ReplyKind::Detail => "  ",
        };

        format!("{marker} {message}")
    }
}
