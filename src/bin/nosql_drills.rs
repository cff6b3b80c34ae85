use nosql_drills::app::App;

#[tokio::main]
async fn main() {
    if let Err(err) = App::run().await {
        eprintln!("Application errored out: {err}");
        std::process::exit(1);
    }
}
