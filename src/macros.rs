//! Variadic front ends. Every argument goes through `Arg::from`, so anything
//! with a `From` impl can be passed directly; wrap errors with [`crate::err`].
//!
//! Without a prefix the global logger is used. `logger: <expr>;` targets an
//! instance instead:
//!
//! ```
//! let logger = kvlog::Logger::default();
//! kvlog::info!(logger: logger; "user created", "name", "Jack", "age", 18);
//! kvlog::warn!("disk almost full", "free_mb", 120);
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! __args {
    ($($arg:expr),*) => {{
        let args: ::std::vec::Vec<$crate::Arg> = ::std::vec![$($crate::Arg::from($arg)),*];
        args
    }};
}

#[macro_export]
macro_rules! debug {
    (logger: $logger:expr; $($arg:expr),* $(,)?) => {
        $logger.debug($crate::__args!($($arg),*))
    };
    ($($arg:expr),* $(,)?) => {
        $crate::global().debug($crate::__args!($($arg),*))
    };
}

#[macro_export]
macro_rules! info {
    (logger: $logger:expr; $($arg:expr),* $(,)?) => {
        $logger.info($crate::__args!($($arg),*))
    };
    ($($arg:expr),* $(,)?) => {
        $crate::global().info($crate::__args!($($arg),*))
    };
}

#[macro_export]
macro_rules! warn {
    (logger: $logger:expr; $($arg:expr),* $(,)?) => {
        $logger.warn($crate::__args!($($arg),*))
    };
    ($($arg:expr),* $(,)?) => {
        $crate::global().warn($crate::__args!($($arg),*))
    };
}

#[macro_export]
macro_rules! error {
    (logger: $logger:expr; $($arg:expr),* $(,)?) => {
        $logger.error($crate::__args!($($arg),*))
    };
    ($($arg:expr),* $(,)?) => {
        $crate::global().error($crate::__args!($($arg),*))
    };
}

/// Level chosen at runtime by name: `log!("warn", "msg", "k", v)`.
#[macro_export]
macro_rules! log {
    (logger: $logger:expr; $level:expr $(, $arg:expr)* $(,)?) => {
        $logger.log($level, $crate::__args!($($arg),*))
    };
    ($level:expr $(, $arg:expr)* $(,)?) => {
        $crate::global().log($level, $crate::__args!($($arg),*))
    };
}
