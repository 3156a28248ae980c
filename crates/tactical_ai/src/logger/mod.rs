//! Глобальный logger для behavior engine
//!
//! Один sink на процесс (`LogPrinter`) + минимальный уровень, оба под одним
//! mutex'ом. Уровень проверяется до форматирования, так что частые `log()`
//! из тика ничего не стоят при Info. Host (движок, тесты, headless бинарь)
//! ставит свой printer через `set_logger`.

use once_cell::sync::Lazy;
use std::sync::Mutex;

struct LoggerState {
    printer: Option<Box<dyn LogPrinter>>,
    min_level: LogLevel,
}

static LOGGER: Lazy<Mutex<LoggerState>> = Lazy::new(|| {
    Mutex::new(LoggerState {
        printer: None,
        min_level: LogLevel::Info,
    })
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Пропускает ли фильтр с этим минимумом сообщение уровня `level`
    pub fn allows(self, level: LogLevel) -> bool {
        level >= self
    }
}

pub trait LogPrinter: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Заменяет текущий printer
pub fn set_logger(printer: Box<dyn LogPrinter>) {
    if let Ok(mut state) = LOGGER.lock() {
        state.printer = Some(printer);
    }
}

pub fn set_log_level(level: LogLevel) {
    if let Ok(mut state) = LOGGER.lock() {
        state.min_level = level;
    }
}

/// Console printer, если host ещё ничего не поставил
pub fn init_logger() {
    if let Ok(mut state) = LOGGER.lock() {
        if state.printer.is_none() {
            state.printer = Some(Box::new(ConsoleLogger));
        }
    }
}

pub fn log(message: &str) {
    emit(LogLevel::Debug, message);
}

pub fn log_info(message: &str) {
    emit(LogLevel::Info, message);
}

pub fn log_warning(message: &str) {
    emit(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    emit(LogLevel::Error, message);
}

fn emit(level: LogLevel, message: &str) {
    let Ok(state) = LOGGER.lock() else {
        return;
    };
    if !state.min_level.allows(level) {
        return;
    }
    if let Some(printer) = state.printer.as_ref() {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        printer.log(level, &format!("[{}] {}", timestamp, message));
    }
}

/// stdout для Debug/Info, stderr для Warning/Error
pub struct ConsoleLogger;

impl LogPrinter for ConsoleLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug | LogLevel::Info => println!("[tactical {}] {}", level.label(), message),
            LogLevel::Warning | LogLevel::Error => eprintln!("[tactical {}] {}", level.label(), message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert!(LogLevel::Info.allows(LogLevel::Warning));
        assert!(LogLevel::Info.allows(LogLevel::Info));
        assert!(!LogLevel::Info.allows(LogLevel::Debug));
        assert!(!LogLevel::Error.allows(LogLevel::Warning));
        assert_eq!(LogLevel::Warning.label(), "WARN");
    }
}
