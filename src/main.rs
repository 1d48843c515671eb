use tinysh::{Interpreter, logging};

fn main() -> anyhow::Result<()> {
    logging::init();
    Interpreter::default().repl()
}
