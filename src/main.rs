fn main() {
    emoji_translator_lib::run()
}
