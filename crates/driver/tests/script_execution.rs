//! End-to-end interpreter behavior: compiled scripts running on clones.

mod common;

use cinder_core::Value;
use common::{EMPTY_BOOT, array_of, call, clone_obj, world};

#[test]
fn arithmetic_strings_and_ternary() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/calc",
            "add(a, b) { return a + b; }\n\
             pick(x) { return x ? \"yes\" : \"no\"; }\n\
             shifted(n) { return (n << 2) | 1; }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/calc");
    assert_eq!(
        call(&mut d, obj, "add", vec![Value::Int(2), Value::Int(3)]),
        Value::Int(5)
    );
    assert_eq!(
        call(&mut d, obj, "add", vec![Value::str("foo"), Value::str("bar")]),
        Value::str("foobar")
    );
    // integer 0 concatenates as the empty string
    assert_eq!(
        call(&mut d, obj, "add", vec![Value::Int(0), Value::str("x")]),
        Value::str("x")
    );
    assert_eq!(
        call(&mut d, obj, "pick", vec![Value::Int(1)]),
        Value::str("yes")
    );
    assert_eq!(
        call(&mut d, obj, "pick", vec![Value::Int(0)]),
        Value::str("no")
    );
    assert_eq!(
        call(&mut d, obj, "shifted", vec![Value::Int(3)]),
        Value::Int(13)
    );
}

#[test]
fn globals_persist_between_calls_and_mark_dirty() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/counter",
            "int count;\nbump() { count++; return count; }\nget() { return count; }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/counter");
    if let Some(o) = d.objects.get_mut(obj) {
        o.dirty = false;
    }
    assert_eq!(call(&mut d, obj, "bump", vec![]), Value::Int(1));
    assert_eq!(call(&mut d, obj, "bump", vec![]), Value::Int(2));
    assert_eq!(call(&mut d, obj, "get", vec![]), Value::Int(2));
    assert!(d.objects.get(obj).unwrap().dirty, "global store sets dirty");
}

#[test]
fn array_growth_and_aliasing() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/arrays",
            "test() {\n\
             \tint *a;\n\
             \tint *b;\n\
             \ta = ({ });\n\
             \tb = a;\n\
             \ta[10] = 99;\n\
             \treturn ({ sizeof(a), sizeof(b), b[10] });\n\
             }\n\
             bounded() {\n\
             \tint fixed[5];\n\
             \tfixed[4] = 1;\n\
             \treturn sizeof(fixed);\n\
             }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/arrays");
    let result = call(&mut d, obj, "test", vec![]);
    assert_eq!(
        array_of(&result),
        vec![Value::Int(11), Value::Int(11), Value::Int(99)]
    );
    assert_eq!(call(&mut d, obj, "bounded", vec![]), Value::Int(5));
}

#[test]
fn bounded_array_overflow_is_a_runtime_error() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/arrays",
            "overflow() {\n\
             \tint fixed[5];\n\
             \tfixed[5] = 1;\n\
             \treturn 123;\n\
             }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/arrays");
    // the failing function yields integer 0 instead of 123
    assert_eq!(call(&mut d, obj, "overflow", vec![]), Value::Int(0));
}

#[test]
fn mapping_literals_subtraction_and_members() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/maps",
            "test() {\n\
             \tmapping m;\n\
             \tmapping n;\n\
             \tm = ([ \"a\":1, \"b\":2, \"c\":3 ]);\n\
             \tn = m - ([ \"b\":0 ]);\n\
             \treturn ({ sizeof(n), member(n, \"b\"), member(n, \"a\"), n[\"c\"] });\n\
             }\n\
             autovivify() {\n\
             \tmapping m;\n\
             \tm[\"k\"] = 7;\n\
             \treturn m[\"k\"] + sizeof(m);\n\
             }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/maps");
    let result = call(&mut d, obj, "test", vec![]);
    assert_eq!(
        array_of(&result),
        vec![Value::Int(2), Value::Int(0), Value::Int(1), Value::Int(3)]
    );
    assert_eq!(call(&mut d, obj, "autovivify", vec![]), Value::Int(8));
}

#[test]
fn diamond_inheritance_shares_base_storage() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/dbase",
            "int b;\nset_b(v) { b = v; }\nget_b() { return b; }\n",
        ),
        (
            "/left",
            "inherit \"/dbase\";\nset_via_left(v) { set_b(v); }\n",
        ),
        (
            "/right",
            "inherit \"/dbase\";\nget_via_right() { return get_b(); }\n",
        ),
        (
            "/diamond",
            "inherit \"/left\";\ninherit \"/right\";\ndirect() { return b; }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/diamond");
    call(&mut d, obj, "set_via_left", vec![Value::Int(999)]);
    assert_eq!(call(&mut d, obj, "get_via_right", vec![]), Value::Int(999));
    // the derived program reads the same storage by name
    assert_eq!(call(&mut d, obj, "direct", vec![]), Value::Int(999));
}

#[test]
fn super_calls_reach_the_parent_definition() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        ("/parent", "greet() { return \"parent\"; }\n"),
        (
            "/child",
            "inherit \"/parent\";\ngreet() { return \"child:\" + ::greet(); }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/child");
    assert_eq!(call(&mut d, obj, "greet", vec![]), Value::str("child:parent"));
}

#[test]
fn cycle_limit_aborts_runaway_calls() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        ("/spin", "f() { while (1) { } return 7; }\n"),
    ]);
    let obj = clone_obj(&mut d, "/spin");
    assert_eq!(call(&mut d, obj, "f", vec![]), Value::Int(0));
    // counters reset on the next top-level call
    assert_eq!(
        cinder_driver::interp::call_named(&mut d, obj, "f", vec![], None, None),
        Some(Value::Int(0))
    );
}

#[test]
fn runtime_errors_stay_local_to_the_failing_function() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/faulty",
            "boom() { return 1 / 0; }\nsafe() { int r; r = boom(); return r + 5; }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/faulty");
    // boom() fails, returns 0 to safe(), which continues normally
    assert_eq!(call(&mut d, obj, "safe", vec![]), Value::Int(5));
}

#[test]
fn recursion_depth_is_capped() {
    let (_dir, mut d) = world(&[EMPTY_BOOT, ("/deep", "f(n) { return f(n + 1); }\n")]);
    let obj = clone_obj(&mut d, "/deep");
    assert_eq!(call(&mut d, obj, "f", vec![Value::Int(0)]), Value::Int(0));
}

#[test]
fn call_other_skips_static_functions() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/thing",
            "static hidden() { return 1; }\nvisible() { return 2; }\n",
        ),
        (
            "/prober",
            "probe(target) { return ({ target.hidden(), target.visible() }); }\n",
        ),
    ]);
    let thing = clone_obj(&mut d, "/thing");
    let prober = clone_obj(&mut d, "/prober");
    let result = call(&mut d, prober, "probe", vec![Value::Object(thing)]);
    assert_eq!(array_of(&result), vec![Value::Int(0), Value::Int(2)]);
}

#[test]
fn destructed_references_read_as_zero() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/holder",
            "object held;\nhold(o) { held = o; }\ncheck() { return held ? 1 : 0; }\n",
        ),
        ("/victim", "ping() { return 1; }\n"),
    ]);
    let holder = clone_obj(&mut d, "/holder");
    let victim = clone_obj(&mut d, "/victim");
    call(&mut d, holder, "hold", vec![Value::Object(victim)]);
    assert_eq!(call(&mut d, holder, "check", vec![]), Value::Int(1));

    d.queue_destruct(victim);
    d.process_destructs();
    assert!(!d.objects.is_live(victim));
    // the stored handle now reads as integer 0
    assert_eq!(call(&mut d, holder, "check", vec![]), Value::Int(0));
}

#[test]
fn verbs_route_typed_commands() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/player",
            "int looks;\nstring last_arg;\n\
             init() { add_verb(\"look\", \"do_look\"); add_xverb(\"'\", \"do_say\"); }\n\
             do_look(arg) { looks++; last_arg = arg; return 1; }\n\
             do_say(arg) { last_arg = arg; return 1; }\n\
             get_looks() { return looks; }\n\
             get_last() { return last_arg; }\n",
        ),
    ]);
    let player = clone_obj(&mut d, "/player");
    d.run_command(player, "look around");
    assert_eq!(call(&mut d, player, "get_looks", vec![]), Value::Int(1));
    assert_eq!(
        call(&mut d, player, "get_last", vec![]),
        Value::str("around")
    );
    // xverbs match as a prefix and pass the tail through
    d.run_command(player, "'hello there");
    assert_eq!(
        call(&mut d, player, "get_last", vec![]),
        Value::str("hello there")
    );
}

#[test]
fn move_object_builds_container_chains() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        ("/room", "ignore() { }\n"),
        ("/thing", "ignore() { }\n"),
    ]);
    let room = clone_obj(&mut d, "/room");
    let a = clone_obj(&mut d, "/thing");
    let b = clone_obj(&mut d, "/thing");
    assert!(d.move_object(a, room));
    assert!(d.move_object(b, room));
    // most recent move is at the head of the chain
    let first = d.objects.get(room).unwrap().contents.unwrap();
    assert_eq!(first, b);
    let second = d.objects.get(first).unwrap().next_object.unwrap();
    assert_eq!(second, a);
    assert_eq!(d.objects.get(a).unwrap().location, Some(room));
    // cycles are refused
    assert!(!d.move_object(room, a));
    d.unlink_from_container(b);
    assert_eq!(d.objects.get(room).unwrap().contents, Some(a));
}

#[test]
fn alarms_fire_in_stable_order() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/log",
            "string trace;\n\
             first() { trace = trace + \"a\"; }\n\
             second() { trace = trace + \"b\"; }\n\
             third() { trace = trace + \"c\"; }\n\
             get_trace() { return trace; }\n",
        ),
    ]);
    let obj = clone_obj(&mut d, "/log");
    d.queue_alarm(obj, 0, "first");
    d.queue_alarm(obj, 0, "second");
    d.queue_alarm(obj, 5, "third");
    // re-registering replaces, keeping one pending alarm per function
    d.queue_alarm(obj, 0, "second");
    assert_eq!(d.alarms.len(), 3);
    let remaining = d.remove_alarm(obj, Some("third"));
    assert_eq!(remaining, 5);
    assert_eq!(d.remove_alarm(obj, Some("third")), -1);

    d.tick();
    assert_eq!(call(&mut d, obj, "get_trace", vec![]), Value::str("ab"));
}

#[test]
fn input_to_diverts_one_line_then_commands_resume() {
    let (_dir, mut d) = world(&[
        EMPTY_BOOT,
        (
            "/user",
            "string got;\n\
             ask() { input_to(this_object(), \"answer\"); }\n\
             answer(line) { got = line; }\n\
             get_got() { return got; }\n",
        ),
    ]);
    let user = clone_obj(&mut d, "/user");
    cinder_driver::interp::call_named(&mut d, user, "ask", vec![], Some(user), None);
    d.deliver_input(user, "blue".to_string());
    assert_eq!(call(&mut d, user, "get_got", vec![]), Value::str("blue"));
    // the diversion was one-shot; the next line becomes a command
    d.deliver_input(user, "north".to_string());
    assert_eq!(d.commands.len(), 1);
}
