/// Tags a string with its call site, the way the teacher's own
/// `engine::errors::here!()` does. Used when building `ApplicationState`
/// descriptions for `ERROR` transitions so an operator reading the event log
/// can find the code path without attached tracing spans.
#[macro_export]
macro_rules! here {
    () => {
        concat!("at ", file!(), " line ", line!(), " column ", column!())
    };
}
