use folio::build::base_path_from_config;
use folio::build::pipeline::plugins::source::discover;
use folio::config::{Config, resolve_config_path};
use folio::filter::{Expression, match_all};

use crate::CheckArgs;

pub fn run(args: &CheckArgs) -> Result<(), anyhow::Error> {
    let expression = match Expression::parse(&args.expression) {
        Ok(expression) => expression,
        Err(err) => {
            eprintln!("{}", err.annotate(&args.expression));
            return Err(err.into());
        }
    };
    println!("ok: {expression}");
    println!("{:#?}", expression.root());

    if args.matches {
        let config_path = resolve_config_path(args.config_file.as_deref())?;
        let config = Config::load_from_file(&config_path)?;
        let content_dir = base_path_from_config(&config_path).join(&config.site.content);

        let (items, _) = discover(&content_dir)?;
        for item in match_all(&expression, &items) {
            println!("{}\t{}", item.slug, item.href);
        }
    }

    Ok(())
}
