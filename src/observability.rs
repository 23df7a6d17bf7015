use biometrics::{Collector, Counter, Moments};

pub(crate) static SESSION_REQUESTS: Counter = Counter::new("thalassist.session.requests");
pub(crate) static SESSION_REQUEST_ERRORS: Counter =
    Counter::new("thalassist.session.request_errors");
pub(crate) static SESSION_RETRIES: Counter = Counter::new("thalassist.session.retries");
pub(crate) static SESSION_REQUEST_DURATION: Moments =
    Moments::new("thalassist.session.request_duration_seconds");
pub(crate) static SESSION_REFRESHES: Counter = Counter::new("thalassist.session.refreshes");
pub(crate) static SESSION_REFRESH_JOINS: Counter =
    Counter::new("thalassist.session.refresh_joins");
pub(crate) static SESSION_REFRESH_FAILURES: Counter =
    Counter::new("thalassist.session.refresh_failures");
pub(crate) static SESSION_EXPIRED: Counter = Counter::new("thalassist.session.expired");

pub(crate) static CHAT_MESSAGES_SENT: Counter = Counter::new("thalassist.chat.messages_sent");
pub(crate) static CHAT_REPLY_ERRORS: Counter = Counter::new("thalassist.chat.reply_errors");
pub(crate) static CHAT_REPLY_DURATION: Moments =
    Moments::new("thalassist.chat.reply_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&SESSION_REQUESTS);
    collector.register_counter(&SESSION_REQUEST_ERRORS);
    collector.register_counter(&SESSION_RETRIES);
    collector.register_moments(&SESSION_REQUEST_DURATION);
    collector.register_counter(&SESSION_REFRESHES);
    collector.register_counter(&SESSION_REFRESH_JOINS);
    collector.register_counter(&SESSION_REFRESH_FAILURES);
    collector.register_counter(&SESSION_EXPIRED);

    collector.register_counter(&CHAT_MESSAGES_SENT);
    collector.register_counter(&CHAT_REPLY_ERRORS);
    collector.register_moments(&CHAT_REPLY_DURATION);
}
