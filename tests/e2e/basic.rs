use crate::*;

#[test]
fn first_build_runs_script() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Remakefile", "out: in\n\tcp in out\n")?;
    space.write("in", "payload")?;
    space.remake_ok(&["out"])?;
    assert_eq!(space.read("out")?, b"payload");
    assert_eq!(space.read_str(".remake")?.trim_end(), "out: in");
    Ok(())
}

#[test]
fn second_build_does_nothing() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Remakefile", "out: in\n\tcp in out\n\techo ran >> log\n")?;
    space.write("in", "")?;
    space.remake_ok(&["out"])?;
    assert_eq!(space.read_str("log")?, "ran\n");

    space.remake_ok(&["out"])?;
    // The script did not run again and the database is unchanged.
    assert_eq!(space.read_str("log")?, "ran\n");
    assert_eq!(space.read_str(".remake")?.trim_end(), "out: in");
    Ok(())
}

#[test]
fn multi_target_rule_runs_once() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Remakefile", "a b:\n\techo ran >> log\n\ttouch a b\n")?;
    space.remake_ok(&["a", "b"])?;
    assert!(space.exists("a"));
    assert!(space.exists("b"));
    assert_eq!(space.read_str("log")?, "ran\n");
    Ok(())
}

#[test]
fn targets_become_positional_parameters() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Remakefile", "a b:\n\techo $1 $2 > order\n\ttouch a b\n")?;
    space.remake_ok(&["a"])?;
    assert_eq!(space.read_str("order")?, "a b\n");
    Ok(())
}

#[test]
fn no_targets_is_a_successful_noop() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Remakefile", "out:\n\ttouch out\n")?;
    let out = space.remake(&[])?;
    assert_eq!(out.status.code(), Some(0));
    assert!(!space.exists("out"));
    Ok(())
}

#[test]
fn failing_script_removes_outputs() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Remakefile", "out:\n\techo partial > out\n\tfalse\n")?;
    let out = space.remake(&["out"])?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "Failed to build out");
    assert!(!space.exists("out"));
    // The database is still written on a failed build.
    assert!(space.exists(".remake"));
    Ok(())
}

#[test]
fn no_rule_for_unknown_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Remakefile", "out:\n\ttouch out\n")?;
    let out = space.remake(&["mystery"])?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "No rule for building mystery");
    Ok(())
}

#[test]
fn missing_rule_file_is_fatal() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.remake(&["out"])?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "no Remakefile found");
    Ok(())
}

#[test]
fn syntax_error_reports_line() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Remakefile", "out: in\n\ttouch out\n: nothing\n")?;
    let out = space.remake(&["out"])?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "syntax error at line 3");
    Ok(())
}

#[test]
fn static_deps_chain() -> anyhow::Result<()> {
    // mid is a static dep of out; both build from one invocation.
    let space = TestSpace::new()?;
    space.write(
        "Remakefile",
        "out: mid\n\tcp mid out\n\nmid: in\n\tcp in mid\n",
    )?;
    space.write("in", "chained")?;
    space.remake_ok(&["out"])?;
    assert_eq!(space.read("out")?, b"chained");
    let db = space.read_str(".remake")?;
    assert!(db.contains("out: mid"), "db was: {}", db);
    assert!(db.contains("mid: in"), "db was: {}", db);
    Ok(())
}

#[test]
fn failed_static_dep_poisons_dependent() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Remakefile",
        "out: mid\n\tcp mid out\n\nmid:\n\tfalse\n",
    )?;
    let out = space.remake(&["out"])?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "Failed to build mid");
    assert!(!space.exists("out"));
    Ok(())
}
