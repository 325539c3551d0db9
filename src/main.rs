fn main() -> surge::error::AppResult<()> {
    surge::entry::run()
}
