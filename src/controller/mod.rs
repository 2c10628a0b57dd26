//! Job progress controller: a pure state machine over the four-screen flow.
//!
//! Every input (user action, push event, poll result, API response) is a
//! [`Msg`]; [`update`] folds it into [`SessionState`] and returns the
//! [`Effect`]s the session driver must execute. No I/O happens here.

mod effect;
mod msg;
mod state;
mod update;

pub use effect::{Effect, Notice, NoticeLevel};
pub use msg::Msg;
pub use state::{
    JobView, Regeneration, Screen, SessionState, SessionView, UploadOutcome, UploadReceipt,
    UploadState,
};
pub use update::update;
