use netapi_session::PlatformRegistry;

pub fn run() {
    for name in PlatformRegistry::with_builtin().names() {
        println!("{name}");
    }
}
