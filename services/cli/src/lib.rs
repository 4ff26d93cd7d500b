mod cli;
mod demo;
mod infra;

use smart_recruiter::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
