//! Scala grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_scala::LANGUAGE.into())
}

pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[
        ("object_definition", Some(ElementKind::Class)),
        ("trait_definition", Some(ElementKind::Class)),
        ("val_definition", Some(ElementKind::Variable)),
        ("var_definition", Some(ElementKind::Variable)),
    ],
    name_fields: &[("val_definition", "pattern"), ("var_definition", "pattern")],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Scope;
    use crate::parser::languages::extract;

    const SOURCE: &str = r#"import scala.collection.mutable

trait Greeter {
  def greet(name: String): String
}

class Friendly(prefix: String) extends Greeter {
  val greeting = "hi"

  def greet(name: String): String = {
    if (name.isEmpty) prefix else s"$prefix $name"
  }
}

object Main {
  def main(args: Array[String]): Unit = println("ok")
}
"#;

    #[test]
    fn test_scala_definitions() {
        let ex = extract("scala", grammar, SOURCE);

        let classes: Vec<_> = ex.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(classes, vec!["Greeter", "Friendly", "Main"]);

        let friendly = &ex.classes[1];
        assert_eq!(friendly.bases, vec!["Greeter"]);
        assert_eq!(friendly.methods, vec!["greet"]);

        let main = ex.functions.iter().find(|f| f.name == "main").unwrap();
        assert_eq!(main.parameters, vec!["args"]);
    }

    #[test]
    fn test_scala_vals() {
        let ex = extract("scala", grammar, SOURCE);
        assert!(
            ex.variables
                .iter()
                .any(|v| v.name == "greeting" && v.scope == Scope::Class),
            "Expected greeting val"
        );
        assert_eq!(ex.imports[0].name, "scala.collection.mutable");
    }
}
