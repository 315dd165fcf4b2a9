use predicates::prelude::*;

mod common;

#[test]
fn test_node_add_and_show() {
    let mut ctx = common::rebootctl();
    ctx.cmd.args(["node", "add", "0", "0/lxc/1"]);
    ctx.cmd.assert().success();

    ctx.new_cmd()
        .args(["node", "show", "0", "0/lxc/1", "7"])
        .assert()
        .success()
        .stdout("0\talive\n0/lxc/1\talive\n7\tunknown\n");
}

#[test]
fn test_node_add_is_idempotent() {
    let ctx = common::rebootctl();
    ctx.run(&["node", "add", "0"]);
    ctx.run(&["node", "add", "0"]);
}

#[test]
fn test_set_life() {
    let ctx = common::with_tree();
    ctx.run(&["node", "set-life", "0/lxc/0", "dying"]);

    ctx.new_cmd()
        .args(["node", "show", "0/lxc/0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dying"));
}

#[test]
fn test_invalid_node_id_is_rejected() {
    let mut ctx = common::rebootctl();
    ctx.cmd.args(["node", "add", "0/docker/1"]);
    ctx.cmd.assert().failure();
}

#[test]
fn test_leading_zero_index_is_rejected() {
    let mut ctx = common::rebootctl();
    ctx.cmd.args(["node", "add", "00"]);
    ctx.cmd
        .assert()
        .failure()
        .stderr(predicate::str::contains("leading zeros"));
}
