use colored::Colorize;

fn main() {
    if let Err(err) = diamond::run() {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}
