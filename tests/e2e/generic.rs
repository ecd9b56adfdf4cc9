//! Tests for generic (`%`) rules and rule selection.

use crate::*;

#[test]
fn generic_rule_substitutes_stem() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Remakefile",
        "%.out: %.in\n\tcp ${1%.out}.in $1\n",
    )?;
    space.write("foo.in", "stem works")?;
    space.remake_ok(&["foo.out"])?;
    assert_eq!(space.read("foo.out")?, b"stem works");
    // The substituted static dep was recorded.
    assert_eq!(space.read_str(".remake")?.trim_end(), "foo.out: foo.in");
    Ok(())
}

#[test]
fn literal_rule_preempts_generic() -> anyhow::Result<()> {
    for rules in [
        "%.out: %.in\n\techo generic > $1\n\nfoo.out: foo.in\n\techo literal > $1\n",
        "foo.out: foo.in\n\techo literal > $1\n\n%.out: %.in\n\techo generic > $1\n",
    ] {
        let space = TestSpace::new()?;
        space.write("Remakefile", rules)?;
        space.write("foo.in", "")?;
        space.remake_ok(&["foo.out"])?;
        assert_eq!(space.read_str("foo.out")?, "literal\n");
    }
    Ok(())
}

#[test]
fn tighter_pattern_preempts_looser() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Remakefile",
        "%: \n\techo loose > $1\n\nlib%.a: \n\techo tight > $1\n",
    )?;
    space.remake_ok(&["libfoo.a"])?;
    assert_eq!(space.read_str("libfoo.a")?, "tight\n");
    Ok(())
}

#[test]
fn generic_multi_target_builds_siblings() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Remakefile",
        "%.c %.h: \n\techo $1 $2 > gen\n\ttouch $1 $2\n",
    )?;
    space.remake_ok(&["parse.c"])?;
    assert!(space.exists("parse.c"));
    assert!(space.exists("parse.h"));
    assert_eq!(space.read_str("gen")?, "parse.c parse.h\n");
    Ok(())
}
