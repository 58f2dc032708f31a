use pegvm::{Grammar, MatchConfig, Program};
use termwiz::lineedit::{line_editor_terminal, LineEditor, LineEditorHost, NopLineEditorHost};

use crate::show_match;

pub fn repl(
    grammar: &Grammar,
    program: &Program,
    config: &MatchConfig,
    full: bool,
) -> termwiz::Result<()> {
    let mut terminal = line_editor_terminal()?;
    let mut editor = LineEditor::new(&mut terminal);
    let mut host = NopLineEditorHost::default();

    editor.set_prompt("peg> ");

    // Ctrl-C and Ctrl-D give None
    while let Some(line) = editor.read_line(&mut host)? {
        host.history().add(&line);

        match line.trim() {
            ":quit" | ":q" => break,
            ":rules" => {
                for (name, addr) in program.rules() {
                    match grammar.get(name) {
                        Some(rule) => println!("{:>5}  {}", addr, rule),
                        None => println!("{:>5}  {}", addr, name),
                    }
                }
            }
            _ => {
                if let Err(ono) = show_match(program, &line, config, full) {
                    println!("{}", ono);
                }
            }
        }
    }

    Ok(())
}
