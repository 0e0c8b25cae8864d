use std::io::Write;

/// 覆盖默认过滤规则的环境变量，语法与 `RUST_LOG` 相同，例如 `TRUVIS_LOG=truvis_rdg=trace`
pub const LOG_FILTER_ENV: &str = "TRUVIS_LOG";

/// 初始化全局日志，默认级别为 Info
pub fn init_log() {
    init_log_with_level(log::LevelFilter::Info);
}

/// 使用指定的默认级别初始化全局日志
///
/// 如果设置了 [`LOG_FILTER_ENV`]，会在默认级别之上追加其中的过滤规则。
pub fn init_log_with_level(level: log::LevelFilter) {
    builder(level).init();
}

/// 单元测试使用的日志初始化
///
/// 可以被多个测试重复调用，输出会被 test harness 捕获。
pub fn init_test_log() {
    let _ = builder(log::LevelFilter::Debug).is_test(true).try_init();
}

fn builder(level: log::LevelFilter) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.format(format_record).filter_level(level);
    if let Ok(filters) = std::env::var(LOG_FILTER_ENV) {
        builder.parse_filters(&filters);
    }
    builder
}

fn format_record(buf: &mut env_logger::fmt::Formatter, record: &log::Record) -> std::io::Result<()> {
    let info_style = buf
        .default_level_style(log::Level::Info)
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green)));
    let level_style = match record.level() {
        log::Level::Info => info_style,
        log::Level::Warn => {
            buf.default_level_style(log::Level::Warn).fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)))
        }
        log::Level::Error => {
            buf.default_level_style(log::Level::Error).fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)))
        }
        level => buf.default_level_style(level),
    };
    let grey_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));
    let black_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(75, 75, 75))));

    let line = record.line().unwrap_or(!0);
    // windows 和 unix 的路径分隔符都要处理
    let file = record.file().unwrap_or("").rsplit(['\\', '/']).next().unwrap_or("");
    let time = chrono::Local::now().format("%H:%M:%S");
    let level = record.level();

    writeln!(
        buf,
        "{level_style}[{time}] {level}{level_style:#} {grey_style}[{file}:{line}]{grey_style:#} \
         {black_style}{}{black_style:#}",
        record.args()
    )
}
