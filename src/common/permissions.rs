use nix::unistd::Uid;

/// Ensures the binary is being executed as root
pub fn ensure_root() {
    if !Uid::effective().is_root() {
        log::error!("This program must be run as root to create network namespaces");
        std::process::exit(1);
    }
}
