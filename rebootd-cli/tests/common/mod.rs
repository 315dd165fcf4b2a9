use assert_cmd::Command;
use tempfile::TempDir;

/// A `rebootctl` invocation bound to a private home directory.
///
/// `cmd` is ready for the command under test; `new_cmd` builds further
/// invocations against the same home.
pub struct TestContext {
    pub cmd: Command,
    pub home: TempDir,
}

impl TestContext {
    /// Fresh command against the same home.
    pub fn new_cmd(&self) -> Command {
        command_in(&self.home)
    }

    /// Run one command to completion and require success.
    pub fn run(&self, args: &[&str]) {
        self.new_cmd().args(args).assert().success();
    }
}

pub fn rebootctl() -> TestContext {
    let home = TempDir::new().expect("temp home");
    let cmd = command_in(&home);
    TestContext { cmd, home }
}

fn command_in(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rebootctl").expect("rebootctl binary");
    cmd.arg("--home").arg(home.path());
    cmd.env_remove("REBOOTD_HOME");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Machine `0`, container `0/lxc/0` and nested `0/lxc/0/kvm/0`.
pub fn with_tree() -> TestContext {
    let ctx = rebootctl();
    ctx.run(&["node", "add", "0", "0/lxc/0", "0/lxc/0/kvm/0"]);
    ctx
}
