use finch::error;
use finch::{Error, Interpreter, RuntimeError};
use pretty_assertions::assert_eq;

type TestResult = error::GenericResult<()>;

// run finch code using a fresh interpreter and return a string containing the program output
fn run(code: &str) -> error::GenericResult<String> {
    let mut buffer = Vec::new();
    let mut interpreter = Interpreter::new(&mut buffer);
    finch::execute(code, &mut interpreter)?;

    let output = std::str::from_utf8(buffer.as_slice())?;

    Ok(output.to_string())
}

// run code that is expected to fail at runtime, returning the error and any output produced before it
fn run_failing(code: &str) -> (RuntimeError, String) {
    let mut buffer = Vec::new();
    let mut interpreter = Interpreter::new(&mut buffer);
    let error = match finch::execute(code, &mut interpreter) {
        Err(Error::Runtime(error)) => error,
        other => panic!("expected a runtime error, got {other:?}"),
    };

    (error, String::from_utf8_lossy(&buffer).into_owned())
}

#[test]
fn variable_scoping() -> TestResult {
    let code = "\
        var a = \"global a\";\n\
        var b = \"global b\";\n\
        var c = \"global c\";\n\
        {\n\
            var a = \"outer a\";\n\
            var b = \"outer b\";\n\
            {\n\
                var a = \"inner a\";\n\
                print a;\n\
                print b;\n\
                print c;\n\
            }\n\
            print a;\n\
            print b;\n\
            print c;\n\
        }\n\
        print a;\n\
        print b;\n\
        print c;";

    let output = run(code)?;

    let expected = "\
        inner a\n\
        outer b\n\
        global c\n\
        outer a\n\
        outer b\n\
        global c\n\
        global a\n\
        global b\n\
        global c\n";

    assert_eq!(expected, output);

    Ok(())
}

#[test]
fn shadowing_restores_outer_binding() -> TestResult {
    let output = run("var x = 1; { var x = 2; print x; } print x;")?;
    assert_eq!("2\n1\n", output);

    Ok(())
}

#[test]
fn block_bindings_do_not_leak() {
    let (error, output) = run_failing("{ var inner = 1; print inner; } print inner;");
    assert_eq!("1\n", output);
    assert_eq!(
        RuntimeError::UndefinedVariable {
            name: "inner".to_string(),
            line: 1
        },
        error
    );
}

#[test]
fn reassignment() -> TestResult {
    let code = "\
        var a = \"original\";\n\
        a = \"updated\";\n\
        print a;";

    let output = run(code)?;
    assert_eq!("updated\n", output);

    Ok(())
}

#[test]
fn assignment_updates_the_defining_scope() -> TestResult {
    let code = "\
        var a = 1;
        {
            a = 2;
            var a = 3;
            a = 4;
            print a;
        }
        print a;";

    let output = run(code)?;
    assert_eq!("4\n2\n", output);

    Ok(())
}

#[test]
fn assignment_is_right_associative_and_yields_value() -> TestResult {
    let output = run("var a = 1; var b = 2; a = b = 7; print a; print b; print a = 3;")?;
    assert_eq!("7\n7\n3\n", output);

    Ok(())
}

#[test]
fn undefined_variable_read() {
    let (error, _) = run_failing("print missing;");
    assert_eq!(
        RuntimeError::UndefinedVariable {
            name: "missing".to_string(),
            line: 1
        },
        error
    );
}

#[test]
fn undefined_variable_assignment() {
    let (error, _) = run_failing("\n\nmissing = 3;");
    assert_eq!(
        RuntimeError::UndefinedVariable {
            name: "missing".to_string(),
            line: 3
        },
        error
    );
    assert_eq!("[line 3] Undefined variable 'missing'.", error.to_string());
}

#[test]
fn arithmetic() -> TestResult {
    let output = run("print 2 + 3; print 10 / 4; print 7 - 10; print 1.5 * 4; print -(3 + 2); print 2 + 3 * 4;")?;
    assert_eq!("5\n2.5\n-3\n6\n-5\n14\n", output);

    Ok(())
}

#[test]
fn comparison_and_equality() -> TestResult {
    let code = "\
        print 1 < 2;
        print 2 <= 2;
        print 3 > 4;
        print 4 >= 5;
        print 1 == 1;
        print \"a\" == \"a\";
        print nil == nil;
        print 1 == \"1\";
        print nil == false;
        print true != false;";

    let output = run(code)?;
    assert_eq!("true\ntrue\nfalse\nfalse\ntrue\ntrue\ntrue\nfalse\nfalse\ntrue\n", output);

    Ok(())
}

#[test]
fn string_concatenation() -> TestResult {
    let output = run("var greeting = \"hello\" + \", \" + 'world'; print greeting;")?;
    assert_eq!("hello, world\n", output);

    Ok(())
}

#[test]
fn mixed_addition_is_an_error() {
    let (error, _) = run_failing("print 1 + \"one\";");
    assert_eq!(
        RuntimeError::InvalidOperand {
            message: "Operands must be two numbers or two strings.".to_string(),
            line: 1
        },
        error
    );
}

#[test]
fn numeric_operators_reject_other_kinds() {
    let (error, _) = run_failing("print \"a\" < \"b\";");
    assert!(matches!(error, RuntimeError::InvalidOperand { .. }));

    let (error, _) = run_failing("print -\"a\";");
    assert_eq!(
        RuntimeError::InvalidOperand {
            message: "Operand must be a number.".to_string(),
            line: 1
        },
        error
    );
}

#[test]
fn division_by_zero() {
    let (error, _) = run_failing("print 1 / 0;");
    assert_eq!(RuntimeError::DivisionByZero { line: 1 }, error);
}

#[test]
fn truthiness() -> TestResult {
    let code = "\
        print !nil;
        print !false;
        print !0;
        print !\"\";
        print !!true;";

    let output = run(code)?;
    assert_eq!("true\ntrue\nfalse\nfalse\ntrue\n", output);

    Ok(())
}

#[test]
fn if_statement_true() -> TestResult {
    let code = "\
        var a = \"do it\";\n\
        if (a == \"do it\") {\n\
            print \"condition was true\";\n\
        }";

    let output = run(code)?;
    assert_eq!("condition was true\n", output);

    Ok(())
}

#[test]
fn if_statement_false() -> TestResult {
    let code = "\
        var a = true;\n\
        if (!a) {\n\
            print \"condition was true\";\n\
        }";

    let output = run(code)?;
    assert!(output.is_empty());

    Ok(())
}

#[test]
fn if_else_statement() -> TestResult {
    let code = "\
        var a = \"cond2\";\n\
        if (a == \"cond1\") {\n\
            print \"if condition was true\";\n\
        } else if (a == \"cond2\") {\n\
            print \"else condition was true\";\n\
        }";

    let output = run(code)?;
    assert_eq!("else condition was true\n", output);

    Ok(())
}

#[test]
fn dangling_else_binds_to_nearest_if() -> TestResult {
    let output = run("if (true) if (false) print \"inner\"; else print \"else\";")?;
    assert_eq!("else\n", output);

    let output = run("if (false) if (true) print \"inner\"; else print \"else\";")?;
    assert!(output.is_empty());

    Ok(())
}

#[test]
fn logical_or() -> TestResult {
    let code = "\
        var a = true;\n\
        var b = false;\n\
        if (a or b) {\n\
            print \"condition was true\";\n\
        }";

    let output = run(code)?;
    assert_eq!("condition was true\n", output);

    Ok(())
}

#[test]
fn logical_and() -> TestResult {
    let code = "\
        var a = true;\n\
        var b = false;\n\
        if (a and b) {\n\
            print \"condition was true\";\n\
        }";

    let output = run(code)?;
    assert!(output.is_empty());

    Ok(())
}

#[test]
fn logical_operators_return_operand_values() -> TestResult {
    let output = run("print nil or \"fallback\"; print 0 and \"second\"; print false and 1; print 1 or 2;")?;
    assert_eq!("fallback\nsecond\nfalse\n1\n", output);

    Ok(())
}

#[test]
fn logical_operators_short_circuit() -> TestResult {
    let output = run("print true or (1/0); print false and (1/0);")?;
    assert_eq!("true\nfalse\n", output);

    let output = run("\
        var calls = 0;
        fun touch() { calls = calls + 1; return true; }
        var ignored = true or touch();
        ignored = false and touch();
        ignored = false or touch();
        print calls;")?;
    assert_eq!("1\n", output);

    Ok(())
}

#[test]
fn while_loop() -> TestResult {
    let code = "\
        var a = 0;\n\
        while (a < 5) {\n\
            print a;\n\
            a = a + 1;\n\
        }";

    let output = run(code)?;
    assert_eq!("0\n1\n2\n3\n4\n", output);

    Ok(())
}

#[test]
fn for_loop() -> TestResult {
    let code = "\
        for (var a = 0; a < 5; a = a + 1) { print a; }
        for (var a = 14; a >= 10; ) { print a; a = a - 1; }
        var a = 20;
        for (; a < 25;) { print a; a = a + 1; }";

    let output = run(code)?;
    assert_eq!(
        "0\n1\n2\n3\n4\n14\n13\n12\n11\n10\n20\n21\n22\n23\n24\n",
        output
    );

    Ok(())
}

#[test]
fn for_loop_variable_stays_in_loop_scope() {
    let (error, output) = run_failing("for (var i = 0; i < 3; i = i + 1) print i; print i;");
    assert_eq!("0\n1\n2\n", output);
    assert_eq!(
        RuntimeError::UndefinedVariable {
            name: "i".to_string(),
            line: 1
        },
        error
    );
}

#[test]
fn function_declaration() -> TestResult {
    let code = "\
        fun say(n) {
            if (n > 2) print \"big one\";
            print n;
        }
        say(3);";

    let output = run(code)?;
    assert_eq!("big one\n3\n", output);

    Ok(())
}

#[test]
fn function_return() -> TestResult {
    let code = "\
        fun getNumber() {
            return 82;
            print \"Shouldn't reach this.\";
        }
        var result = getNumber();
        print result;";

    let output = run(code)?;
    assert_eq!("82\n", output);

    Ok(())
}

#[test]
fn return_unwinds_nested_blocks_and_loops() -> TestResult {
    let code = "\
        fun find(limit) {
            var i = 0;
            while (true) {
                {
                    for (var j = 0; j < 10; j = j + 1) {
                        if (i * 10 + j == limit) {
                            return j;
                        }
                    }
                }
                i = i + 1;
            }
            print \"unreachable\";
        }
        print find(23);
        print \"after\";";

    let output = run(code)?;
    assert_eq!("3\nafter\n", output);

    Ok(())
}

#[test]
fn missing_return_yields_nil() -> TestResult {
    let output = run("fun nothing() { var a = 1; } fun bare() { return; } print nothing(); print bare();")?;
    assert_eq!("nil\nnil\n", output);

    Ok(())
}

#[test]
fn arity_mismatch() {
    let (error, _) = run_failing("fun pair(a, b) { return a + b; }\nprint pair(1);");
    assert_eq!(
        RuntimeError::ArityMismatch {
            expected: 2,
            found: 1,
            line: 2
        },
        error
    );

    let (error, _) = run_failing("fun none() {} none(1, 2);");
    assert!(matches!(error, RuntimeError::ArityMismatch { expected: 0, found: 2, .. }));
}

#[test]
fn calling_a_non_function() {
    let (error, _) = run_failing("var notFunction = \"text\"; notFunction();");
    assert_eq!(RuntimeError::NotCallable { line: 1 }, error);
}

#[test]
fn arguments_evaluate_left_to_right() -> TestResult {
    let code = "\
        fun show(value) { print value; return value; }
        fun three(a, b, c) { return a + b + c; }
        print three(show(1), show(2), show(3));";

    let output = run(code)?;
    assert_eq!("1\n2\n3\n6\n", output);

    Ok(())
}

#[test]
fn recursion() -> TestResult {
    let code = "\
        fun fib(n) {
            if (n <= 1) return n;
            return fib(n - 2) + fib(n - 1);
        }

        for (var i = 0; i < 20; i = i + 1) {
            print fib(i);
        }";

    let output = run(code)?;
    assert_eq!("0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n55\n89\n144\n233\n377\n610\n987\n1597\n2584\n4181\n", output);

    Ok(())
}

#[test]
fn first_class_functions() -> TestResult {
    let code = "\
        fun say(n) {
            print n;
        }
        var sayAlias = say;
        sayAlias(\"test string\");
        print say;
        print say == sayAlias;";

    let output = run(code)?;
    assert_eq!("test string\n<fn say>\ntrue\n", output);

    Ok(())
}

#[test]
fn function_capture() -> TestResult {
    let code = "\
        var funcRef;
        {
            var divisor = 2;
            fun printHalf(n) {
                var result = n / divisor;
                print result;
            }
            funcRef = printHalf;
        }
        var divisor = 300;
        funcRef(8);";

    let output = run(code)?;
    assert_eq!("4\n", output);

    Ok(())
}

#[test]
fn capture_with_reassignment() -> TestResult {
    let code = "\
        var funcRef;
        {
            var divisor = 2;
            fun printDivisionResult(n) {
                var result = n / divisor;
                print result;
            }
            printDivisionResult(32);
            divisor = 8;
            funcRef = printDivisionResult;
            printDivisionResult(32);
        }
        var divisor = 400; // not captured and shouldn't affect the function
        funcRef(32);";

    let output = run(code)?;
    assert_eq!("16\n4\n4\n", output);

    Ok(())
}

#[test]
fn closures_keep_their_own_state() -> TestResult {
    let code = "\
        fun makeCounter() {
            var count = 0;
            fun increment() {
                count = count + 1;
                return count;
            }
            return increment;
        }
        var first = makeCounter();
        var second = makeCounter();
        print first();
        print first();
        print second();
        print first();";

    let output = run(code)?;
    assert_eq!("1\n2\n1\n3\n", output);

    Ok(())
}

#[test]
fn functions_resolve_free_variables_lexically() -> TestResult {
    let code = "\
        var name = \"global\";
        fun show() { print name; }
        fun caller() {
            var name = \"caller local\";
            show();
        }
        caller();";

    let output = run(code)?;
    assert_eq!("global\n", output);

    Ok(())
}

#[test]
fn native_functions() -> TestResult {
    let code = "\
        print sqrt(16);
        print toString(1.5) + \"!\";
        var start = clock();
        print clock() >= start;
        print clock;";

    let output = run(code)?;
    assert_eq!("4\n1.5!\ntrue\n<native fn clock>\n", output);

    Ok(())
}

#[test]
fn native_function_errors() {
    let (error, _) = run_failing("sqrt(\"four\");");
    assert_eq!(
        RuntimeError::Native {
            name: "sqrt".to_string(),
            message: "Expected number argument, got string.".to_string(),
            line: 1
        },
        error
    );

    let (error, _) = run_failing("clock(1);");
    assert!(matches!(error, RuntimeError::ArityMismatch { expected: 0, found: 1, .. }));
}

#[test]
fn runaway_recursion_overflows_cleanly() {
    let (error, _) = run_failing("fun forever(n) { return forever(n + 1); } forever(0);");
    assert_eq!(RuntimeError::StackOverflow { line: 1 }, error);
}

#[test]
fn deepest_allowed_recursion_completes() -> TestResult {
    // each call nests an if, a loop and two blocks around the recursive call
    let code = "\
        fun f(n) {\n\
            if (n > 0) {\n\
                while (true) { { var a = (n - 1) * 1 + 0; return f(a) + 1; } }\n\
            }\n\
            return 0;\n\
        }\n\
        print f(255);";

    assert_eq!("255\n", run(code)?);

    let (error, _) = run_failing(&code.replace("f(255)", "f(256)"));
    assert_eq!(RuntimeError::StackOverflow { line: 3 }, error);
    Ok(())
}

#[test]
fn deeply_nested_expressions_evaluate() -> TestResult {
    let depth = 250;
    let code = format!("print {}1{};", "(".repeat(depth), ")".repeat(depth));
    assert_eq!("1\n", run(&code)?);

    let negations = "-".repeat(250);
    assert_eq!("1\n", run(&format!("print {negations}1;"))?);
    Ok(())
}

#[test]
fn output_stops_at_runtime_error() {
    let (error, output) = run_failing("print \"before\";\nprint nil + 1;\nprint \"after\";");
    assert_eq!("before\n", output);
    assert_eq!(Some(2), error.line());
}
