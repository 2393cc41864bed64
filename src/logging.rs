use color_eyre::Result;
use log::LevelFilter;
use ratatui::style::{Color, Style, Stylize};
use ratatui::widgets::{Block, Borders};
use tui_logger::{TuiLoggerLevelOutput, TuiLoggerWidget};

/// Routes the `log` facade into tui-logger's buffer.
///
/// `verbose` lets planner and executor debug lines through.
pub fn setup_logging(verbose: bool) -> Result<()> {
    tui_logger::init_logger(LevelFilter::Trace)?;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    tui_logger::set_default_level(level);

    log::info!("Logger ready at {}", level);
    Ok(())
}

/// Log pane shown under the robot status.
pub fn create_log_widget<'a>() -> TuiLoggerWidget<'a> {
    TuiLoggerWidget::default()
        .block(
            Block::default()
                .title("Robot log")
                .border_style(Style::default().fg(Color::DarkGray))
                .borders(Borders::ALL),
        )
        .output_separator(' ')
        .output_timestamp(Some("%H:%M:%S%.3f".to_string()))
        .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
        .output_target(false)
        .output_file(false)
        .output_line(false)
        .style_error(Style::default().fg(Color::Red).bold())
        .style_warn(Style::default().fg(Color::Yellow))
        .style_info(Style::default().fg(Color::Cyan))
        .style_debug(Style::default().fg(Color::Gray))
        .style_trace(Style::default().fg(Color::DarkGray))
}
